//! Strategy Dispatcher
//!
//! Executes exactly one caching strategy per request against the namespace of
//! the tier the request resolved to.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{
    current_timestamp_ms, CacheEntry, CacheTier, EvictionEngine, Snapshot, StatsRecorder,
    StrategyKind,
};
use crate::error::{CacheError, Result};
use crate::network::{Fetcher, ResourceRequest};
use crate::storage::StorageBackend;

// == Strategy Dispatcher ==
#[derive(Clone)]
pub struct StrategyDispatcher {
    storage: Arc<dyn StorageBackend>,
    fetcher: Arc<dyn Fetcher>,
    eviction: EvictionEngine,
    stats: StatsRecorder,
    network_timeout: Duration,
    /// Background revalidations still in flight
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl StrategyDispatcher {
    // == Constructor ==
    /// # Arguments
    /// * `network_timeout` - Bound for the NetworkFirst race
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
        stats: StatsRecorder,
        network_timeout: Duration,
    ) -> Self {
        Self {
            eviction: EvictionEngine::new(storage.clone(), stats.clone()),
            storage,
            fetcher,
            stats,
            network_timeout,
            background: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn eviction(&self) -> &EvictionEngine {
        &self.eviction
    }

    // == Execute ==
    /// Satisfies `request` according to `tier.strategy`.
    pub async fn execute(
        &self,
        tier: &CacheTier,
        namespace: &str,
        key: &str,
        request: &ResourceRequest,
    ) -> Result<Snapshot> {
        debug!("{:?} {} via {}", tier.strategy, key, namespace);
        match tier.strategy {
            StrategyKind::CacheFirst => self.cache_first(tier, namespace, key, request).await,
            StrategyKind::NetworkFirst => self.network_first(tier, namespace, key, request).await,
            StrategyKind::StaleWhileRevalidate => {
                self.stale_while_revalidate(tier, namespace, key, request)
                    .await
            }
            StrategyKind::CacheOnly => self.cache_only(tier, namespace, key).await,
            StrategyKind::NetworkOnly => self.fetch(request).await,
        }
    }

    async fn cache_first(
        &self,
        tier: &CacheTier,
        namespace: &str,
        key: &str,
        request: &ResourceRequest,
    ) -> Result<Snapshot> {
        if let Some(entry) = self.read(tier, namespace, key).await {
            self.stats.record_hit();
            return Ok(entry.payload);
        }
        self.stats.record_miss();

        let snapshot = self
            .fetch(request)
            .await
            .map_err(|e| unavailable(key, &e))?;
        if snapshot.is_success() {
            self.store(tier, namespace, key, snapshot.clone()).await;
        }
        Ok(snapshot)
    }

    async fn network_first(
        &self,
        tier: &CacheTier,
        namespace: &str,
        key: &str,
        request: &ResourceRequest,
    ) -> Result<Snapshot> {
        match self.fetch_with_timeout(request).await {
            Ok(snapshot) => {
                if snapshot.is_success() {
                    self.store(tier, namespace, key, snapshot.clone()).await;
                }
                Ok(snapshot)
            }
            Err(e) => {
                debug!("Network failed for {}, falling back to cache: {}", key, e);
                match self.read(tier, namespace, key).await {
                    Some(entry) => {
                        self.stats.record_hit();
                        Ok(entry.payload)
                    }
                    None => {
                        self.stats.record_miss();
                        Err(unavailable(key, &e))
                    }
                }
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        tier: &CacheTier,
        namespace: &str,
        key: &str,
        request: &ResourceRequest,
    ) -> Result<Snapshot> {
        if let Some(entry) = self.read(tier, namespace, key).await {
            self.stats.record_hit();
            self.revalidate(tier, namespace, key, request);
            return Ok(entry.payload);
        }
        self.stats.record_miss();

        // Nothing cached yet: one network-first attempt
        let snapshot = self
            .fetch_with_timeout(request)
            .await
            .map_err(|e| unavailable(key, &e))?;
        if snapshot.is_success() {
            self.store(tier, namespace, key, snapshot.clone()).await;
        }
        Ok(snapshot)
    }

    async fn cache_only(&self, tier: &CacheTier, namespace: &str, key: &str) -> Result<Snapshot> {
        match self.read(tier, namespace, key).await {
            Some(entry) => {
                self.stats.record_hit();
                Ok(entry.payload)
            }
            None => {
                self.stats.record_miss();
                Err(CacheError::ResourceUnavailable(format!(
                    "{}: not in {}",
                    key, namespace
                )))
            }
        }
    }

    // == Background Revalidation ==
    fn revalidate(&self, tier: &CacheTier, namespace: &str, key: &str, request: &ResourceRequest) {
        let this = self.clone();
        let tier = tier.clone();
        let namespace = namespace.to_string();
        let key = key.to_string();
        let request = request.clone();

        let handle = tokio::spawn(async move {
            match this.fetch(&request).await {
                Ok(snapshot) if snapshot.is_success() => {
                    this.write_through(&tier, &namespace, &key, snapshot).await;
                }
                Ok(snapshot) => {
                    debug!("Revalidation of {} returned {}, keeping cached copy", key, snapshot.status);
                }
                Err(e) => warn!("Background revalidation of {} failed: {}", key, e),
            }
        });

        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Waits for every background revalidation started so far.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
                background.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                let _ = handle.await;
            }
        }
    }

    // == Network ==
    /// Fetches from the network, recording the outcome.
    pub async fn fetch(&self, request: &ResourceRequest) -> Result<Snapshot> {
        let result = self.fetcher.fetch(request).await;
        self.stats.record_fetch(result.is_ok());
        result
    }

    async fn fetch_with_timeout(&self, request: &ResourceRequest) -> Result<Snapshot> {
        match tokio::time::timeout(self.network_timeout, self.fetch(request)).await {
            Ok(result) => result,
            Err(_) => {
                self.stats.record_fetch(false);
                Err(CacheError::Network(format!(
                    "{}: timed out after {}ms",
                    request.url,
                    self.network_timeout.as_millis()
                )))
            }
        }
    }

    // == Cache Access ==
    async fn read(&self, tier: &CacheTier, namespace: &str, key: &str) -> Option<CacheEntry> {
        match self
            .eviction
            .read_fresh(namespace, tier, key, current_timestamp_ms())
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Read of '{}' from {} failed, treating as miss: {}", key, namespace, e);
                None
            }
        }
    }

    /// Writes a snapshot in a detached task, so the write completes even if
    /// the caller is dropped mid-request.
    ///
    /// Returns true once the entry is durable.
    pub async fn store(&self, tier: &CacheTier, namespace: &str, key: &str, snapshot: Snapshot) -> bool {
        let this = self.clone();
        let tier = tier.clone();
        let namespace = namespace.to_string();
        let key = key.to_string();

        let task = tokio::spawn(async move {
            this.write_through(&tier, &namespace, &key, snapshot).await
        });
        task.await.unwrap_or(false)
    }

    async fn write_through(&self, tier: &CacheTier, namespace: &str, key: &str, snapshot: Snapshot) -> bool {
        let entry = CacheEntry::new(key, snapshot);

        if let Err(e) = self.storage.put(namespace, entry.clone()).await {
            warn!("Write of '{}' to {} failed, retrying after eviction: {}", key, namespace, e);
            if let Err(e) = self
                .eviction
                .force_pass(namespace, tier, current_timestamp_ms())
                .await
            {
                warn!("Forced eviction on {} failed: {}", namespace, e);
            }
            if let Err(e) = self.storage.put(namespace, entry).await {
                warn!("Dropping write of '{}' to {}: {}", key, namespace, e);
                self.stats.record_dropped_write();
                return false;
            }
        }

        if let Err(e) = self
            .eviction
            .enforce(namespace, tier, current_timestamp_ms())
            .await
        {
            warn!("Eviction pass on {} failed: {}", namespace, e);
        }
        true
    }
}

fn unavailable(key: &str, cause: &CacheError) -> CacheError {
    CacheError::ResourceUnavailable(format!("{}: {}", key, cause))
}
