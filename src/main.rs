//! Offline Cache - control server
//!
//! Runs the caching layer in front of one origin and exposes it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_cache::api::{create_router, AppState};
use offline_cache::lifecycle::{FixedVersion, OriginVersion, VersionSource};
use offline_cache::network::{Fetcher, HttpFetcher};
use offline_cache::storage::{FileStorage, MemoryStorage, StorageBackend};
use offline_cache::{spawn_message_loop, spawn_sweep_task, CacheManager, Config};

/// Main entry point for the offline cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build storage, fetcher and version source
/// 4. Register the caching process
/// 5. Start the expiry sweep and the control message loop
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Offline Cache Server");

    let config = Config::from_env().context("loading configuration")?;
    info!(
        "Configuration loaded: app_id={}, version={}, origin={}, port={}, tiers={}",
        config.app_id,
        config.version,
        config.origin_url,
        config.server_port,
        config.tiers.len()
    );

    let storage: Arc<dyn StorageBackend> = match &config.cache_dir {
        Some(dir) => {
            info!("Persisting namespaces under {}", dir.display());
            Arc::new(FileStorage::new(dir.clone()).await?)
        }
        None => Arc::new(MemoryStorage::new()),
    };

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.origin_url.clone(), config.fetch_timeout())?);
    let versions: Arc<dyn VersionSource> = match &config.version_path {
        Some(path) => Arc::new(OriginVersion::new(fetcher.clone(), path.clone())),
        None => Arc::new(FixedVersion::new(config.version.clone())),
    };

    let sweep_interval = Duration::from_secs(config.sweep_interval.max(1));
    let manager = CacheManager::new(config.clone(), storage, fetcher, versions)?;

    match manager.register_caching_process().await {
        Some(handle) => info!("Caching process {} is {}", handle.version(), handle.state()),
        None => warn!("Caching disabled, serving straight from the network"),
    }

    // The control server is the app shell: updates wait for an explicit skip
    let _app_shell = manager.claim_client();

    let mut tasks = vec![spawn_sweep_task(manager.clone(), sweep_interval)];
    if let Some(receiver) = manager.take_message_receiver() {
        tasks.push(spawn_message_loop(manager.clone(), receiver));
    }
    info!("Background tasks started");

    let app = create_router(AppState::new(manager));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("serving control API")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in tasks {
        task.abort();
    }
    warn!("Background tasks aborted");
}
