//! Lifecycle Controller
//!
//! Registers the caching process, installs new versions into fresh
//! namespaces, holds them in `Waiting` while older clients are open, and
//! removes every foreign namespace once a version activates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::{belongs_to_version, namespaces_for, TierRegistry};
use crate::error::{CacheError, Result};
use crate::events::{Subscribers, Subscription};
use crate::lifecycle::{ClientGuard, ClientTracker, LifecycleState, RegistrationHandle, VersionSource};
use crate::prefetch::PrefetchManager;
use crate::storage::StorageBackend;

// == Lifecycle Event ==
/// Notifications for the application context.
///
/// Serialized with a `type` tag, e.g. `{"type":"update-available"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    /// A new version reached `Waiting`
    UpdateAvailable,
    Activated { version: String },
    Unregistered,
}

// == Controller Settings ==
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub app_id: String,
    /// Host supports a caching process at all
    pub supported: bool,
    /// URLs stored at install time
    pub precache: Vec<String>,
}

struct Inner {
    settings: ControllerSettings,
    registry: Arc<TierRegistry>,
    storage: Arc<dyn StorageBackend>,
    prefetch: PrefetchManager,
    source: Arc<dyn VersionSource>,
    clients: Arc<ClientTracker>,
    events: Subscribers<LifecycleEvent>,
    // Serializes register/update/activate/unregister
    ops: Mutex<()>,
    active: RwLock<Option<Arc<RegistrationHandle>>>,
    waiting: RwLock<Option<Arc<RegistrationHandle>>>,
    next_id: AtomicU64,
}

// == Lifecycle Controller ==
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<Inner>,
}

impl LifecycleController {
    pub fn new(
        settings: ControllerSettings,
        registry: Arc<TierRegistry>,
        storage: Arc<dyn StorageBackend>,
        prefetch: PrefetchManager,
        source: Arc<dyn VersionSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                registry,
                storage,
                prefetch,
                source,
                clients: Arc::new(ClientTracker::new()),
                events: Subscribers::new(),
                ops: Mutex::new(()),
                active: RwLock::new(None),
                waiting: RwLock::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    // == Accessors ==
    /// The activated handle, if any.
    pub fn active(&self) -> Option<Arc<RegistrationHandle>> {
        self.inner.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn active_version(&self) -> Option<String> {
        self.active().map(|h| h.version().to_string())
    }

    /// The installed version held back by open clients, if any.
    pub fn waiting(&self) -> Option<Arc<RegistrationHandle>> {
        self.inner.waiting.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn claim_client(&self) -> ClientGuard {
        self.inner.clients.claim()
    }

    pub fn open_clients(&self) -> usize {
        self.inner.clients.open_clients()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(callback)
    }

    fn next_handle(&self, version: String) -> Arc<RegistrationHandle> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        Arc::new(RegistrationHandle::new(id, version))
    }

    // == Register ==
    /// Registers the caching process and activates it.
    ///
    /// Idempotent: while a handle exists, every call returns that same handle.
    /// Returns None if the host lacks support or the registration is rejected.
    pub async fn register(&self) -> Option<Arc<RegistrationHandle>> {
        if !self.inner.settings.supported {
            let err = CacheError::FeatureUnsupported("host has no caching process support".to_string());
            info!("{}", err);
            return None;
        }

        let _ops = self.inner.ops.lock().await;
        if let Some(handle) = self.active() {
            debug!("Already registered as {}", handle.version());
            return Some(handle);
        }

        let version = match self.inner.source.latest_version().await {
            Ok(version) => version,
            Err(e) => {
                error!("Registration failed: {}", e);
                return None;
            }
        };

        let handle = self.next_handle(version);
        handle.transition(LifecycleState::Registering);
        info!("Registering caching process {}", handle.version());

        if let Err(e) = self.install(&handle).await {
            error!("Registration failed: {}", e);
            handle.transition(LifecycleState::Redundant);
            return None;
        }
        handle.transition(LifecycleState::Installed);

        self.activate_locked(handle.clone()).await;
        Some(handle)
    }

    // == Unregister ==
    /// Drops the registration. Cached namespaces are left in place.
    pub async fn unregister(&self) -> bool {
        let _ops = self.inner.ops.lock().await;

        let waiting = self.inner.waiting.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(waiting) = waiting {
            waiting.transition(LifecycleState::Redundant);
        }

        let active = self.inner.active.write().unwrap_or_else(|e| e.into_inner()).take();
        match active {
            Some(handle) => {
                handle.transition(LifecycleState::Redundant);
                info!("Caching process {} unregistered", handle.version());
                self.inner.events.dispatch(&LifecycleEvent::Unregistered);
                true
            }
            None => false,
        }
    }

    // == Check For Update ==
    /// Installs a newly deployed version, if there is one.
    ///
    /// With open clients the new version waits and `update-available` is
    /// emitted; otherwise it activates right away.
    pub async fn check_for_update(&self) {
        let _ops = self.inner.ops.lock().await;

        let Some(current) = self.active() else {
            debug!("No active registration, skipping update check");
            return;
        };

        let latest = match self.inner.source.latest_version().await {
            Ok(version) => version,
            Err(e) => {
                warn!("Update check failed: {}", e);
                return;
            }
        };
        if latest == current.version() {
            debug!("Caching process {} is up to date", latest);
            return;
        }

        if let Some(waiting) = self.waiting() {
            if waiting.version() == latest {
                debug!("Version {} already waiting", latest);
                return;
            }
            // Superseded before it ever activated
            waiting.transition(LifecycleState::Redundant);
            *self.inner.waiting.write().unwrap_or_else(|e| e.into_inner()) = None;
        }

        let handle = self.next_handle(latest);
        handle.transition(LifecycleState::Installing);
        info!("Update found: {} -> {}", current.version(), handle.version());

        if let Err(e) = self.install(&handle).await {
            warn!("Install of {} failed: {}", handle.version(), e);
            handle.transition(LifecycleState::Redundant);
            return;
        }
        handle.transition(LifecycleState::Installed);

        let open = self.inner.clients.open_clients();
        if open == 0 {
            self.activate_locked(handle).await;
            return;
        }

        handle.transition(LifecycleState::Waiting);
        *self.inner.waiting.write().unwrap_or_else(|e| e.into_inner()) = Some(handle.clone());
        info!(
            "Version {} waiting, {} clients still on {}",
            handle.version(),
            open,
            current.version()
        );
        self.inner.events.dispatch(&LifecycleEvent::UpdateAvailable);
        self.activate_when_released(handle.id());
    }

    fn activate_when_released(&self, id: u64) {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.inner.clients.all_released().await;
            if controller.activate_waiting(Some(id)).await {
                info!("Last client released, waiting version activated");
            }
        });
    }

    // == Activate Waiting Version ==
    /// Skip waiting: activates the waiting version immediately.
    ///
    /// Returns false if no version was waiting.
    pub async fn activate_waiting_version(&self) -> bool {
        self.activate_waiting(None).await
    }

    async fn activate_waiting(&self, only_id: Option<u64>) -> bool {
        let _ops = self.inner.ops.lock().await;

        let handle = {
            let mut waiting = self.inner.waiting.write().unwrap_or_else(|e| e.into_inner());
            match (waiting.as_ref(), only_id) {
                (Some(handle), Some(id)) if handle.id() != id => None,
                _ => waiting.take(),
            }
        };

        match handle {
            Some(handle) => {
                self.activate_locked(handle).await;
                true
            }
            None => {
                debug!("No waiting version to activate");
                false
            }
        }
    }

    // == Install ==
    /// Creates the version's namespaces and runs the install precache.
    async fn install(&self, handle: &RegistrationHandle) -> Result<()> {
        let app_id = &self.inner.settings.app_id;
        for namespace in namespaces_for(&self.inner.registry, app_id, handle.version()) {
            self.inner
                .storage
                .open(&namespace.name())
                .await
                .map_err(|e| CacheError::RegistrationFailure(format!("{}: {}", namespace, e)))?;
        }

        let precache = &self.inner.settings.precache;
        if !precache.is_empty() {
            let report = self.inner.prefetch.precache(handle.version(), precache).await;
            if !report.failed.is_empty() {
                warn!("Precache incomplete for {}: {:?}", handle.version(), report.failed);
            }
        }
        Ok(())
    }

    // == Activate ==
    /// Caller holds the ops lock.
    async fn activate_locked(&self, handle: Arc<RegistrationHandle>) {
        handle.transition(LifecycleState::Activating);

        let previous = self
            .inner
            .active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle.clone());
        if let Some(previous) = previous {
            previous.transition(LifecycleState::Redundant);
        }

        let removed = self.cleanup(handle.version()).await;
        handle.transition(LifecycleState::Activated);
        info!(
            "Caching process {} activated, {} old namespaces removed",
            handle.version(),
            removed
        );
        self.inner.events.dispatch(&LifecycleEvent::Activated {
            version: handle.version().to_string(),
        });
    }

    /// Deletes every namespace not belonging to `version`.
    async fn cleanup(&self, version: &str) -> usize {
        let namespaces = match self.inner.storage.list_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                warn!("Cannot enumerate namespaces for cleanup: {}", e);
                return 0;
            }
        };

        let app_id = &self.inner.settings.app_id;
        let mut removed = 0;
        for namespace in namespaces {
            if belongs_to_version(&namespace, &self.inner.registry, app_id, version) {
                continue;
            }
            match self.inner.storage.delete_namespace(&namespace).await {
                Ok(true) => {
                    info!("Deleting old cache: {}", namespace);
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to delete {}: {}", namespace, e),
            }
        }
        removed
    }
}
