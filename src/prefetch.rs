//! Prefetch Manager
//!
//! Seeds tiers ahead of an offline period. Each URL is fetched and stored on
//! its own: one failure is logged and skipped, never failing the batch.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheNamespace, CacheTier, TierRegistry};
use crate::network::{resource_key, ResourceRequest};
use crate::strategy::StrategyDispatcher;

/// Tier seeded by `prefetch_urls`.
pub const PAGES_TIER: &str = "pages";

/// Tier seeded by the `CACHE_URLS` control message.
pub const DYNAMIC_TIER: &str = "dynamic";

// == Prefetch Report ==
/// Outcome of one batch, by input URL.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    pub stored: Vec<String>,
    pub failed: Vec<String>,
}

// == Prefetch Manager ==
#[derive(Clone)]
pub struct PrefetchManager {
    dispatcher: StrategyDispatcher,
    registry: Arc<TierRegistry>,
    app_id: String,
    origin: String,
}

impl PrefetchManager {
    pub fn new(
        dispatcher: StrategyDispatcher,
        registry: Arc<TierRegistry>,
        app_id: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            app_id: app_id.into(),
            origin: origin.into(),
        }
    }

    /// Seeds the pages tier of `version` with `urls`.
    pub async fn prefetch_urls(&self, version: &str, urls: &[String]) -> PrefetchReport {
        self.prefetch_into(version, PAGES_TIER, urls).await
    }

    /// Seeds one named tier of `version` with `urls`.
    pub async fn prefetch_into(&self, version: &str, tier_name: &str, urls: &[String]) -> PrefetchReport {
        let Some(tier) = self.registry.get(tier_name) else {
            warn!("Prefetch skipped: no tier named '{}'", tier_name);
            return PrefetchReport {
                stored: Vec::new(),
                failed: urls.to_vec(),
            };
        };

        let report = self.seed(version, urls, |_| Some(tier)).await;
        info!(
            "Prefetched {} of {} URLs into {}",
            report.stored.len(),
            urls.len(),
            tier_name
        );
        report
    }

    /// Install-time precache: each URL goes to the tier it resolves to.
    pub async fn precache(&self, version: &str, urls: &[String]) -> PrefetchReport {
        let report = self
            .seed(version, urls, |key| self.registry.resolve_tier(key))
            .await;
        info!(
            "Precached {} of {} URLs for {}",
            report.stored.len(),
            urls.len(),
            version
        );
        report
    }

    async fn seed<'a, F>(&self, version: &str, urls: &[String], tier_for: F) -> PrefetchReport
    where
        F: Fn(&str) -> Option<&'a CacheTier>,
    {
        // Fetch concurrently, store in input order
        let fetches = urls.iter().map(|url| async move {
            let request = ResourceRequest::get(url.clone());
            self.dispatcher.fetch(&request).await
        });
        let results = join_all(fetches).await;

        let mut report = PrefetchReport::default();
        for (url, result) in urls.iter().zip(results) {
            let key = resource_key(url, &self.origin);
            let Some(tier) = tier_for(&key) else {
                warn!("Failed to cache {}: no tier matches", url);
                report.failed.push(url.clone());
                continue;
            };

            match result {
                Ok(snapshot) if snapshot.is_success() => {
                    let namespace = CacheNamespace::new(&self.app_id, version, &tier.name).name();
                    if self.dispatcher.store(tier, &namespace, &key, snapshot).await {
                        report.stored.push(url.clone());
                    } else {
                        report.failed.push(url.clone());
                    }
                }
                Ok(snapshot) => {
                    warn!("Failed to cache {}: status {}", url, snapshot.status);
                    report.failed.push(url.clone());
                }
                Err(e) => {
                    warn!("Failed to cache {}: {}", url, e);
                    report.failed.push(url.clone());
                }
            }
        }
        report
    }
}
