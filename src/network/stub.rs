//! In-memory origin for deterministic tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::Snapshot;
use crate::error::{CacheError, Result};
use crate::network::{Fetcher, ResourceRequest};

#[derive(Debug, Default)]
struct Origin {
    routes: HashMap<String, Snapshot>,
    unreachable: HashSet<String>,
    calls: HashMap<String, usize>,
    delay: Option<Duration>,
}

// == Stub Fetcher ==
/// Serves registered routes, 404 for unknown ones, and network errors for
/// URLs marked unreachable or while switched offline.
#[derive(Debug, Default)]
pub struct StubFetcher {
    origin: Mutex<Origin>,
    offline: AtomicBool,
    total_calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn origin(&self) -> std::sync::MutexGuard<'_, Origin> {
        self.origin.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Serves `snapshot` for `url`.
    pub fn route(&self, url: &str, snapshot: Snapshot) -> &Self {
        self.origin().routes.insert(url.to_string(), snapshot);
        self
    }

    /// Serves a 200 text body for `url`.
    pub fn route_text(&self, url: &str, body: &str) -> &Self {
        self.route(url, Snapshot::ok(body.to_string()))
    }

    /// Makes `url` fail with a network error.
    pub fn fail(&self, url: &str) -> &Self {
        self.origin().unreachable.insert(url.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delays every response, for timeout tests.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.origin().delay = delay;
    }

    /// Total fetches attempted.
    pub fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Fetches attempted for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        self.origin().calls.get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Snapshot> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let mut origin = self.origin();
            *origin.calls.entry(request.url.clone()).or_insert(0) += 1;
            origin.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Network(format!("{}: offline", request.url)));
        }

        let origin = self.origin();
        if origin.unreachable.contains(&request.url) {
            return Err(CacheError::Network(format!("{}: unreachable", request.url)));
        }
        Ok(origin
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Snapshot::ok("not found").with_status(404)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_and_counters() {
        let stub = StubFetcher::new();
        stub.route_text("/a", "alpha");

        let found = stub.fetch(&ResourceRequest::get("/a")).await.unwrap();
        assert_eq!(found.body, "alpha");

        let missing = stub.fetch(&ResourceRequest::get("/b")).await.unwrap();
        assert_eq!(missing.status, 404);

        assert_eq!(stub.calls(), 2);
        assert_eq!(stub.calls_for("/a"), 1);
    }

    #[tokio::test]
    async fn test_offline_and_unreachable() {
        let stub = StubFetcher::new();
        stub.route_text("/a", "alpha").fail("/down");

        assert!(stub.fetch(&ResourceRequest::get("/down")).await.is_err());

        stub.set_offline(true);
        assert!(stub.fetch(&ResourceRequest::get("/a")).await.is_err());
        stub.set_offline(false);
        assert!(stub.fetch(&ResourceRequest::get("/a")).await.is_ok());
    }
}
