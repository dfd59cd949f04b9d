//! Cache Module
//!
//! Tiers, entries, version-qualified namespaces, eviction and size inspection.

mod entry;
mod eviction;
mod inspector;
mod namespace;
mod order;
mod stats;
mod tier;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, EntryMeta, Snapshot};
pub use eviction::{EvictionEngine, EvictionReport};
pub use inspector::{format_cache_size, get_cache_size, size_unit_index};
pub use namespace::{belongs_to_version, namespaces_for, CacheNamespace};
pub use order::InsertionOrder;
pub use stats::{CacheStats, StatsRecorder};
pub use tier::{default_tiers, CacheTier, MatchRule, StrategyKind, TierRegistry};
