//! Cache Namespace Module
//!
//! Version-qualified container names: `{app_id}-{version}-{tier}`.

use std::fmt;

use crate::cache::TierRegistry;

// == Cache Namespace ==
/// Name of the container holding one tier's entries for one deployed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheNamespace {
    app_id: String,
    version: String,
    tier: String,
}

impl CacheNamespace {
    pub fn new(app_id: &str, version: &str, tier: &str) -> Self {
        Self {
            app_id: app_id.to_string(),
            version: version.to_string(),
            tier: tier.to_string(),
        }
    }

    /// Storage-level name.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.app_id, self.version, self.tier)
    }
}

/// Namespaces of every registered tier for one version, in priority order.
pub fn namespaces_for(registry: &TierRegistry, app_id: &str, version: &str) -> Vec<CacheNamespace> {
    registry
        .tiers()
        .iter()
        .map(|tier| CacheNamespace::new(app_id, version, &tier.name))
        .collect()
}

/// Returns true if `namespace` is one of the names `namespaces_for` yields.
///
/// Matches whole names only, so `app-v1-beta-pages` never belongs to `v1`.
pub fn belongs_to_version(namespace: &str, registry: &TierRegistry, app_id: &str, version: &str) -> bool {
    registry
        .tiers()
        .iter()
        .any(|tier| CacheNamespace::new(app_id, version, &tier.name).name() == namespace)
}
