//! Cache Statistics Module
//!
//! Tracks hits, misses, evictions and network activity of the strategy dispatcher.

use std::sync::{Arc, Mutex};

use serde::Serialize;

// == Cache Stats ==
/// Counters for cache and network activity.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a tier
    pub hits: u64,
    /// Tier lookups that found nothing usable
    pub misses: u64,
    /// Entries removed by the count bound
    pub evictions: u64,
    /// Entries removed by the age bound
    pub expirations: u64,
    /// Network fetches attempted
    pub network_fetches: u64,
    /// Network fetches that errored or timed out
    pub network_failures: u64,
    /// Writes dropped after the retry also failed
    pub dropped_writes: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Shared handle to the counters, cloned into every component that records.
#[derive(Debug, Clone, Default)]
pub struct StatsRecorder {
    inner: Arc<Mutex<CacheStats>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    pub fn record_hit(&self) {
        self.update(|s| s.hits += 1);
    }

    pub fn record_miss(&self) {
        self.update(|s| s.misses += 1);
    }

    pub fn record_evictions(&self, count: usize) {
        self.update(|s| s.evictions += count as u64);
    }

    pub fn record_expirations(&self, count: usize) {
        self.update(|s| s.expirations += count as u64);
    }

    pub fn record_fetch(&self, succeeded: bool) {
        self.update(|s| {
            s.network_fetches += 1;
            if !succeeded {
                s.network_failures += 1;
            }
        });
    }

    pub fn record_dropped_write(&self) {
        self.update(|s| s.dropped_writes += 1);
    }

    /// Returns a copy of the current counters.
    pub fn snapshot(&self) -> CacheStats {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
