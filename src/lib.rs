//! Offline Cache - an offline-capable resource caching layer
//!
//! Named cache tiers with per-tier strategies, bounded eviction, versioned
//! install/activate/update, connectivity tracking and prefetching, in front
//! of one network origin.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod manager;
pub mod messaging;
pub mod models;
pub mod network;
pub mod prefetch;
pub mod storage;
pub mod strategy;
pub mod tasks;

pub use api::AppState;
pub use cache::format_cache_size;
pub use config::Config;
pub use error::{CacheError, Result};
pub use manager::CacheManager;
pub use tasks::{spawn_message_loop, spawn_sweep_task};
