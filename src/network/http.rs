//! HTTP fetcher backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use tracing::debug;

use crate::cache::Snapshot;
use crate::error::{CacheError, Result};
use crate::network::{is_absolute, Fetcher, ResourceRequest};

// == HTTP Fetcher ==
/// Fetches relative URLs against one origin and absolute URLs as given.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: String,
}

impl HttpFetcher {
    /// # Arguments
    /// * `origin` - Base URL relative requests resolve against
    /// * `timeout` - Bound on each whole request, body included
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            origin: origin.into().trim_end_matches('/').to_string(),
        })
    }

    fn absolute_url(&self, url: &str) -> String {
        if is_absolute(url) {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{}", self.origin, url)
        } else {
            format!("{}/{}", self.origin, url)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ResourceRequest) -> Result<Snapshot> {
        let url = self.absolute_url(&request.url);
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| CacheError::InvalidRequest(format!("bad method '{}'", request.method)))?;

        debug!("Fetching {} {}", method, url);
        let response = self
            .client
            .request(method, &url)
            .send()
            .await
            .map_err(|e| CacheError::Network(format!("{}: {}", url, e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(format!("{}: {}", url, e)))?;

        Ok(Snapshot {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_url_joining() {
        let fetcher = HttpFetcher::new("http://127.0.0.1:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.absolute_url("/a"), "http://127.0.0.1:8080/a");
        assert_eq!(fetcher.absolute_url("a"), "http://127.0.0.1:8080/a");
        assert_eq!(
            fetcher.absolute_url("https://api.example.org/x"),
            "https://api.example.org/x"
        );
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_network_error() {
        // Port 9 (discard) on localhost is not expected to be listening
        let fetcher = HttpFetcher::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let result = fetcher.fetch(&ResourceRequest::get("/")).await;
        assert!(matches!(result, Err(CacheError::Network(_))));
    }

    #[tokio::test]
    async fn test_silent_origin_times_out() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let fetcher = HttpFetcher::new(format!("http://{}", addr), Duration::from_millis(100)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(&ResourceRequest::get("/")),
        )
        .await
        .expect("fetch must give up on its own");

        assert!(matches!(result, Err(CacheError::Network(_))));
        server.abort();
    }
}
