//! Integration Tests for the Versioned Lifecycle
//!
//! Install, update, skip-waiting and cleanup across deployed versions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use offline_cache::{
    lifecycle::{FixedVersion, LifecycleEvent, LifecycleState},
    network::{ResourceRequest, StubFetcher},
    storage::{FileStorage, MemoryStorage, StorageBackend},
    CacheManager, Config,
};

// == Helper Functions ==

fn origin() -> Arc<StubFetcher> {
    let origin = Arc::new(StubFetcher::new());
    origin
        .route_text("/", "home")
        .route_text("/offline", "offline")
        .route_text("/app.js", "console.log(1)")
        .route_text("/api/diseases", "[]")
        .route_text("/conditions/", "conditions");
    origin
}

fn config() -> Config {
    Config {
        app_id: "medref".to_string(),
        ..Config::default()
    }
}

fn manager(storage: Arc<dyn StorageBackend>, versions: &FixedVersion) -> CacheManager {
    CacheManager::new(config(), storage, origin(), Arc::new(versions.clone())).unwrap()
}

async fn populate(manager: &CacheManager) {
    for url in ["/app.js", "/api/diseases", "/conditions/"] {
        manager.handle_request(ResourceRequest::get(url)).await.unwrap();
    }
    manager.settle().await;
}

// == Scenario Tests ==

#[tokio::test]
async fn test_version_bump_replaces_every_namespace() {
    let storage = Arc::new(MemoryStorage::new());
    let versions = FixedVersion::new("v1.0.0");
    let manager = manager(storage.clone(), &versions);

    manager.register_caching_process().await.unwrap();
    populate(&manager).await;
    for tier in ["static", "dynamic", "pages"] {
        let keys = storage.list_keys(&format!("medref-v1.0.0-{}", tier)).await.unwrap();
        assert!(!keys.is_empty(), "{} should be populated", tier);
    }

    let _client = manager.claim_client();
    versions.publish("v1.0.1");
    manager.check_for_update().await;
    assert!(manager.activate_waiting_version().await);

    let namespaces = storage.list_namespaces().await.unwrap();
    assert!(namespaces.iter().all(|n| !n.starts_with("medref-v1.0.0-")));
    assert!(namespaces.iter().all(|n| n.starts_with("medref-v1.0.1-")));

    for tier in ["static", "dynamic"] {
        let keys = storage.list_keys(&format!("medref-v1.0.1-{}", tier)).await.unwrap();
        assert!(keys.is_empty(), "{} should start empty", tier);
    }
    // Only the install precache lands in the new version
    assert_eq!(storage.list_keys("medref-v1.0.1-pages").await.unwrap(), vec!["/"]);
}

#[tokio::test]
async fn test_update_available_only_while_clients_open() {
    let storage = Arc::new(MemoryStorage::new());
    let versions = FixedVersion::new("v1");
    let manager = manager(storage, &versions);
    manager.register_caching_process().await.unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _sub = manager.on_lifecycle_event(move |e| sink.lock().unwrap().push(e.clone()));

    // No clients: activates straight away, no prompt
    versions.publish("v2");
    manager.check_for_update().await;
    assert_eq!(manager.active_version().as_deref(), Some("v2"));
    assert!(!events.lock().unwrap().contains(&LifecycleEvent::UpdateAvailable));

    // With a client: waits and prompts
    let client = manager.claim_client();
    versions.publish("v3");
    manager.check_for_update().await;
    assert_eq!(manager.active_version().as_deref(), Some("v2"));
    assert!(events.lock().unwrap().contains(&LifecycleEvent::UpdateAvailable));

    let waiting = manager.lifecycle().waiting().unwrap();
    let mut state = waiting.watch();
    drop(client);

    tokio::time::timeout(Duration::from_secs(1), async {
        while *state.borrow() != LifecycleState::Activated {
            state.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert_eq!(manager.active_version().as_deref(), Some("v3"));
}

#[tokio::test]
async fn test_concurrent_register_yields_one_handle() {
    let storage = Arc::new(MemoryStorage::new());
    let origin = origin();
    origin.set_delay(Some(Duration::from_millis(20)));
    let manager = CacheManager::new(
        config(),
        storage,
        origin.clone(),
        Arc::new(FixedVersion::new("v1")),
    )
    .unwrap();

    let (a, b) = tokio::join!(
        manager.register_caching_process(),
        manager.register_caching_process()
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    // One install: the precache ran once
    assert_eq!(origin.calls_for("/"), 1);
}

#[tokio::test]
async fn test_unregistered_manager_never_caches() {
    let storage = Arc::new(MemoryStorage::new());
    let versions = FixedVersion::new("v1");
    let manager = manager(storage.clone(), &versions);

    manager.register_caching_process().await.unwrap();
    assert!(manager.unregister_caching_process().await);
    manager.clear_all_caches().await.unwrap();

    manager.handle_request(ResourceRequest::get("/app.js")).await.unwrap();
    assert!(storage.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let versions = FixedVersion::new("v1");

    {
        let storage = Arc::new(FileStorage::new(dir.path()).await.unwrap());
        let manager = manager(storage, &versions);
        manager.register_caching_process().await.unwrap();
        populate(&manager).await;
    }

    let storage = Arc::new(FileStorage::new(dir.path()).await.unwrap());
    let origin = origin();
    origin.set_offline(true);
    let manager = CacheManager::new(config(), storage, origin, Arc::new(versions.clone())).unwrap();

    // Registration needs no network to activate an already-cached version
    manager.register_caching_process().await.unwrap();
    let snapshot = manager.handle_request(ResourceRequest::get("/app.js")).await.unwrap();
    assert_eq!(snapshot.body, "console.log(1)");
}
