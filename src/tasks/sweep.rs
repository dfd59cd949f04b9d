//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from the active
//! version's tiers, on top of the eviction done on every write.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::manager::CacheManager;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// # Arguments
/// * `manager` - The cache manager whose active version is swept
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_sweep_task(manager: CacheManager, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry sweep every {}s", interval.as_secs());

        loop {
            tokio::time::sleep(interval).await;

            let removed = manager.sweep_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: nothing to remove");
            }
        }
    })
}
