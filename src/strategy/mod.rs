//! Caching strategies: CacheFirst, NetworkFirst, StaleWhileRevalidate,
//! CacheOnly and NetworkOnly.

mod dispatcher;

pub use dispatcher::StrategyDispatcher;
