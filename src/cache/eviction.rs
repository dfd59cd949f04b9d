//! Eviction Policy Engine
//!
//! Enforces per-tier age and count bounds on one namespace at a time.
//!
//! The count check reads the key list and trims in the same pass, so an
//! insert racing with it can leave the tier one or two entries over
//! `max_items` until the next write trims again.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheTier, StatsRecorder};
use crate::error::Result;
use crate::storage::StorageBackend;

// == Eviction Report ==
/// Entries removed by one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvictionReport {
    /// Removed by the age bound
    pub expired: usize,
    /// Removed by the count bound
    pub trimmed: usize,
}

impl EvictionReport {
    pub fn total(&self) -> usize {
        self.expired + self.trimmed
    }
}

// == Eviction Engine ==
#[derive(Clone)]
pub struct EvictionEngine {
    storage: Arc<dyn StorageBackend>,
    stats: StatsRecorder,
}

impl EvictionEngine {
    pub fn new(storage: Arc<dyn StorageBackend>, stats: StatsRecorder) -> Self {
        Self { storage, stats }
    }

    // == Purge Expired ==
    /// Removes every entry older than `max_age_ms`.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self, namespace: &str, max_age_ms: u64, now: u64) -> Result<usize> {
        let mut removed = 0;
        for meta in self.storage.list_entries(namespace).await? {
            if meta.is_expired(max_age_ms, now) && self.storage.delete(namespace, &meta.key).await? {
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats.record_expirations(removed);
            debug!("Expired {} entries from {}", removed, namespace);
        }
        Ok(removed)
    }

    // == Trim ==
    /// Evicts oldest entries until at most `max_items` remain.
    ///
    /// Returns the number of entries evicted.
    pub async fn trim_to(&self, namespace: &str, max_items: usize) -> Result<usize> {
        let keys = self.storage.list_keys(namespace).await?;
        if keys.len() <= max_items {
            return Ok(0);
        }

        let excess = keys.len() - max_items;
        let mut evicted = 0;
        for key in keys.iter().take(excess) {
            match self.storage.delete(namespace, key).await {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to evict '{}' from {}: {}", key, namespace, e),
            }
        }

        self.stats.record_evictions(evicted);
        debug!("Trimmed {} items from {}", evicted, namespace);
        Ok(evicted)
    }

    // == Enforce ==
    /// Applies the age bound, then the count bound. Runs after every write.
    pub async fn enforce(&self, namespace: &str, tier: &CacheTier, now: u64) -> Result<EvictionReport> {
        let expired = self.purge_expired(namespace, tier.max_age_ms, now).await?;
        let trimmed = self.trim_to(namespace, tier.max_items).await?;
        Ok(EvictionReport { expired, trimmed })
    }

    // == Forced Pass ==
    /// Frees room before retrying a failed write: purges expired entries and,
    /// if none had expired, evicts the oldest entry.
    pub async fn force_pass(&self, namespace: &str, tier: &CacheTier, now: u64) -> Result<EvictionReport> {
        let expired = self.purge_expired(namespace, tier.max_age_ms, now).await?;
        let mut trimmed = 0;
        if expired == 0 {
            let len = self.storage.list_keys(namespace).await?.len();
            let target = len.saturating_sub(1).min(tier.max_items);
            trimmed = self.trim_to(namespace, target).await?;
        }
        Ok(EvictionReport { expired, trimmed })
    }

    // == Read Fresh ==
    /// Reads an entry, deleting and hiding it if it has outlived the tier's age bound.
    pub async fn read_fresh(
        &self,
        namespace: &str,
        tier: &CacheTier,
        key: &str,
        now: u64,
    ) -> Result<Option<CacheEntry>> {
        match self.storage.get(namespace, key).await? {
            Some(entry) if entry.is_expired(tier.max_age_ms, now) => {
                if self.storage.delete(namespace, key).await? {
                    self.stats.record_expirations(1);
                }
                debug!("Entry '{}' in {} expired on read", key, namespace);
                Ok(None)
            }
            other => Ok(other),
        }
    }
}
