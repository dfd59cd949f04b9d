//! Cache Manager
//!
//! The public face of the caching layer: one explicitly configured instance
//! wiring the tier registry, strategy dispatcher, lifecycle controller,
//! connectivity monitor, prefetcher and control channel together.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::{
    current_timestamp_ms, get_cache_size, CacheNamespace, CacheStats, Snapshot, StatsRecorder,
    TierRegistry,
};
use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{CacheError, Result};
use crate::events::Subscription;
use crate::lifecycle::{
    ClientGuard, ControllerSettings, LifecycleController, LifecycleEvent, RegistrationHandle,
    VersionSource,
};
use crate::messaging::{
    ControlMessage, ControlReply, Envelope, InMemoryChannel, MessageChannel, MessageReceiver,
};
use crate::network::{resource_key, Fetcher, ResourceRequest};
use crate::prefetch::{PrefetchManager, PrefetchReport, DYNAMIC_TIER};
use crate::storage::StorageBackend;
use crate::strategy::StrategyDispatcher;

/// Control messages buffered before posts are dropped.
const MESSAGE_CAPACITY: usize = 32;

struct ManagerInner {
    config: Config,
    registry: Arc<TierRegistry>,
    storage: Arc<dyn StorageBackend>,
    stats: StatsRecorder,
    dispatcher: StrategyDispatcher,
    prefetch: PrefetchManager,
    lifecycle: LifecycleController,
    connectivity: ConnectivityMonitor,
    channel: InMemoryChannel,
    receiver: Mutex<Option<MessageReceiver>>,
}

// == Cache Manager ==
/// Cheap to clone; clones share one caching process.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<ManagerInner>,
}

impl CacheManager {
    // == Constructor ==
    /// Builds a manager from an explicit configuration.
    ///
    /// # Arguments
    /// * `config` - Tier table, identifiers and timeouts
    /// * `storage` - Backend holding every namespace
    /// * `fetcher` - Network side of the cache
    /// * `versions` - Where the deployed version is read from
    ///
    /// # Errors
    /// `Configuration` if the tier table is invalid.
    pub fn new(
        config: Config,
        storage: Arc<dyn StorageBackend>,
        fetcher: Arc<dyn Fetcher>,
        versions: Arc<dyn VersionSource>,
    ) -> Result<Self> {
        let registry = Arc::new(TierRegistry::from_tiers(config.tiers.clone())?);
        let stats = StatsRecorder::new();
        let dispatcher = StrategyDispatcher::new(
            storage.clone(),
            fetcher,
            stats.clone(),
            config.network_timeout(),
        );
        let prefetch = PrefetchManager::new(
            dispatcher.clone(),
            registry.clone(),
            config.app_id.clone(),
            config.origin_url.clone(),
        );

        let mut precache = config.precache_urls.clone();
        if !precache.contains(&config.offline_url) {
            precache.push(config.offline_url.clone());
        }
        let lifecycle = LifecycleController::new(
            ControllerSettings {
                app_id: config.app_id.clone(),
                supported: config.caching_supported,
                precache,
            },
            registry.clone(),
            storage.clone(),
            prefetch.clone(),
            versions,
        );

        let (channel, receiver) = InMemoryChannel::bounded(MESSAGE_CAPACITY);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                config,
                registry,
                storage,
                stats,
                dispatcher,
                prefetch,
                lifecycle,
                connectivity: ConnectivityMonitor::default(),
                channel,
                receiver: Mutex::new(Some(receiver)),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &TierRegistry {
        &self.inner.registry
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.inner.lifecycle
    }

    pub fn active_version(&self) -> Option<String> {
        self.inner.lifecycle.active_version()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    // == Lifecycle ==
    /// Registers the caching process. None if the host has no support or
    /// registration was rejected; never an error.
    pub async fn register_caching_process(&self) -> Option<Arc<RegistrationHandle>> {
        self.inner.lifecycle.register().await
    }

    pub async fn unregister_caching_process(&self) -> bool {
        self.inner.lifecycle.unregister().await
    }

    pub async fn check_for_update(&self) {
        self.inner.lifecycle.check_for_update().await
    }

    /// Skip waiting. Returns false if nothing was waiting.
    pub async fn activate_waiting_version(&self) -> bool {
        self.inner.lifecycle.activate_waiting_version().await
    }

    /// Opens an application client on the active version.
    pub fn claim_client(&self) -> ClientGuard {
        self.inner.lifecycle.claim_client()
    }

    pub fn on_lifecycle_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.inner.lifecycle.subscribe(callback)
    }

    // == Clear All Caches ==
    /// Deletes every namespace regardless of version.
    ///
    /// Returns the number of namespaces deleted.
    pub async fn clear_all_caches(&self) -> Result<usize> {
        let mut deleted = 0;
        for namespace in self.inner.storage.list_namespaces().await? {
            if self.inner.storage.delete_namespace(&namespace).await? {
                deleted += 1;
            }
        }
        info!("Cleared {} cache namespaces", deleted);
        Ok(deleted)
    }

    // == Inspector ==
    /// Total payload bytes across every namespace.
    pub async fn get_cache_size(&self) -> Result<u64> {
        get_cache_size(self.inner.storage.as_ref()).await
    }

    // == Connectivity ==
    pub fn is_offline(&self) -> bool {
        self.inner.connectivity.is_offline()
    }

    /// Feeds the host reachability signal. Returns true on a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.inner.connectivity.set_online(online)
    }

    pub fn on_connection_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.connectivity.subscribe(callback)
    }

    // == Prefetch ==
    /// Seeds the pages tier of the active version.
    ///
    /// Never fails: unreachable URLs are reported and skipped.
    pub async fn prefetch_urls(&self, urls: &[String]) -> PrefetchReport {
        match self.active_version() {
            Some(version) => self.inner.prefetch.prefetch_urls(&version, urls).await,
            None => {
                warn!("Prefetch of {} URLs skipped: no active version", urls.len());
                PrefetchReport {
                    stored: Vec::new(),
                    failed: urls.to_vec(),
                }
            }
        }
    }

    // == Interception ==
    /// Satisfies an outgoing resource request through the caching layer.
    ///
    /// Non-GET requests, unmatched keys and requests made while no version is
    /// active go straight to the network. A GET the network and its own tier
    /// cannot satisfy is looked up in every namespace of the active version;
    /// a navigation still unserved gets the cached offline document.
    pub async fn handle_request(&self, request: ResourceRequest) -> Result<Snapshot> {
        if !request.is_get() {
            debug!("Passing {} {} through", request.method, request.url);
            return self.inner.dispatcher.fetch(&request).await;
        }

        let Some(version) = self.active_version() else {
            return self.passthrough(&request, None).await;
        };

        let key = request.key(&self.inner.config.origin_url);
        let Some(tier) = self.inner.registry.resolve_tier(&key) else {
            return self.passthrough(&request, Some(&version)).await;
        };

        let namespace = CacheNamespace::new(&self.inner.config.app_id, &version, &tier.name).name();
        match self.inner.dispatcher.execute(tier, &namespace, &key, &request).await {
            Err(e @ CacheError::ResourceUnavailable(_)) => self.recover(&request, &version, &key, e).await,
            result => result,
        }
    }

    async fn passthrough(&self, request: &ResourceRequest, version: Option<&str>) -> Result<Snapshot> {
        match (self.inner.dispatcher.fetch(request).await, version) {
            (Err(e), Some(version)) => {
                let key = request.key(&self.inner.config.origin_url);
                self.recover(request, version, &key, e).await
            }
            (result, _) => result,
        }
    }

    /// Last resort for a failed GET: any namespace of `version` holding the
    /// key, then the offline document for navigations.
    async fn recover(
        &self,
        request: &ResourceRequest,
        version: &str,
        key: &str,
        cause: CacheError,
    ) -> Result<Snapshot> {
        if let Some(snapshot) = self.match_any(version, key).await {
            return Ok(snapshot);
        }
        if request.is_navigation() {
            self.offline_fallback(version, cause).await
        } else {
            Err(cause)
        }
    }

    /// Looks `key` up across every tier namespace of `version`, in priority order.
    async fn match_any(&self, version: &str, key: &str) -> Option<Snapshot> {
        let now = current_timestamp_ms();
        for tier in self.inner.registry.tiers() {
            let namespace = CacheNamespace::new(&self.inner.config.app_id, version, &tier.name).name();
            match self.inner.dispatcher.eviction().read_fresh(&namespace, tier, key, now).await {
                Ok(Some(entry)) => {
                    debug!("Serving '{}' from {}", key, namespace);
                    self.inner.stats.record_hit();
                    return Some(entry.payload);
                }
                Ok(None) => {}
                Err(e) => warn!("Lookup of '{}' in {} failed: {}", key, namespace, e),
            }
        }
        None
    }

    async fn offline_fallback(&self, version: &str, cause: CacheError) -> Result<Snapshot> {
        let key = resource_key(&self.inner.config.offline_url, &self.inner.config.origin_url);
        let Some(tier) = self.inner.registry.resolve_tier(&key) else {
            return Err(cause);
        };

        let namespace = CacheNamespace::new(&self.inner.config.app_id, version, &tier.name).name();
        match self
            .inner
            .dispatcher
            .eviction()
            .read_fresh(&namespace, tier, &key, current_timestamp_ms())
            .await
        {
            Ok(Some(entry)) => {
                info!("Serving offline document for failed navigation: {}", cause);
                Ok(entry.payload)
            }
            Ok(None) => Err(cause),
            Err(e) => {
                warn!("Offline document unreadable: {}", e);
                Err(cause)
            }
        }
    }

    // == Maintenance ==
    /// Applies age and count bounds to every tier of the active version.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> usize {
        let Some(version) = self.active_version() else {
            return 0;
        };

        let now = current_timestamp_ms();
        let mut removed = 0;
        for tier in self.inner.registry.tiers() {
            let namespace = CacheNamespace::new(&self.inner.config.app_id, &version, &tier.name).name();
            match self.inner.dispatcher.eviction().enforce(&namespace, tier, now).await {
                Ok(report) => removed += report.total(),
                Err(e) => warn!("Sweep of {} failed: {}", namespace, e),
            }
        }
        removed
    }

    /// Waits for background revalidations started so far.
    pub async fn settle(&self) {
        self.inner.dispatcher.settle().await
    }

    // == Control Messages ==
    /// Posts a message to the caching process without waiting for it.
    pub fn post_message(&self, message: ControlMessage) -> Result<()> {
        self.deliver(Envelope::new(message))
    }

    /// Posts a message and waits for the caching process's reply, at most
    /// `message_timeout_ms`.
    pub async fn request(&self, message: ControlMessage) -> Result<ControlReply> {
        let (envelope, reply) = Envelope::with_reply(message);
        self.deliver(envelope)?;

        match tokio::time::timeout(self.inner.config.message_timeout(), reply).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CacheError::MessageDeliveryFailure(
                "caching process dropped the message".to_string(),
            )),
            Err(_) => {
                warn!("No reply to control message within {:?}", self.inner.config.message_timeout());
                Err(CacheError::MessageDeliveryFailure(
                    "caching process did not reply in time".to_string(),
                ))
            }
        }
    }

    fn deliver(&self, envelope: Envelope) -> Result<()> {
        if self.active_version().is_none() {
            let err = CacheError::MessageDeliveryFailure(format!(
                "{:?}: no active caching process",
                envelope.message
            ));
            warn!("{}", err);
            return Err(err);
        }
        self.inner.channel.post(envelope)
    }

    /// Hands out the receiving end of the control channel, once.
    pub fn take_message_receiver(&self) -> Option<MessageReceiver> {
        self.inner
            .receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Executes one control message inside the caching process.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlReply> {
        match message {
            ControlMessage::SkipWaiting => Ok(ControlReply::Ack {
                ok: self.activate_waiting_version().await,
            }),
            ControlMessage::CacheUrls { urls } => {
                let version = self.active_version().ok_or_else(|| {
                    CacheError::MessageDeliveryFailure("no active caching process".to_string())
                })?;
                let report = self.inner.prefetch.prefetch_into(&version, DYNAMIC_TIER, &urls).await;
                Ok(ControlReply::Prefetched(report))
            }
            ControlMessage::ClearCache => {
                self.clear_all_caches().await?;
                Ok(ControlReply::Ack { ok: true })
            }
            ControlMessage::GetCacheSize => Ok(ControlReply::Size {
                size: self.get_cache_size().await?,
            }),
        }
    }
}
