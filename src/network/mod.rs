//! Network Module
//!
//! The upstream side of the cache: request types and the `Fetcher` seam,
//! with an HTTP implementation and an in-memory origin for tests.

mod http;
mod request;
mod stub;

use async_trait::async_trait;

use crate::cache::Snapshot;
use crate::error::Result;

pub use http::HttpFetcher;
pub use request::{is_absolute, resource_key, RequestMode, ResourceRequest};
pub use stub::StubFetcher;

// == Fetcher ==
/// Performs a network fetch for a request.
///
/// Any non-2xx answer is still `Ok`; `Err` means the network itself failed.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Snapshot>;
}
