//! Where the currently deployed version comes from.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{CacheError, Result};
use crate::network::{Fetcher, ResourceRequest};

// == Version Source ==
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Returns the version currently deployed.
    async fn latest_version(&self) -> Result<String>;
}

// == Fixed Version ==
/// Version set in-process by deployment code; clones share the value.
#[derive(Debug, Clone)]
pub struct FixedVersion {
    current: Arc<RwLock<String>>,
}

impl FixedVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            current: Arc::new(RwLock::new(version.into())),
        }
    }

    /// Deploys a new version; the next update check will find it.
    pub fn publish(&self, version: impl Into<String>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = version.into();
    }

    pub fn current(&self) -> String {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl VersionSource for FixedVersion {
    async fn latest_version(&self) -> Result<String> {
        Ok(self.current())
    }
}

// == Origin Version ==
/// Reads the deployed version from a manifest path on the origin.
///
/// The body is the version string, surrounding whitespace ignored.
pub struct OriginVersion {
    fetcher: Arc<dyn Fetcher>,
    path: String,
}

impl OriginVersion {
    pub fn new(fetcher: Arc<dyn Fetcher>, path: impl Into<String>) -> Self {
        Self {
            fetcher,
            path: path.into(),
        }
    }
}

#[async_trait]
impl VersionSource for OriginVersion {
    async fn latest_version(&self) -> Result<String> {
        let snapshot = self.fetcher.fetch(&ResourceRequest::get(self.path.clone())).await?;
        if !snapshot.is_success() {
            return Err(CacheError::RegistrationFailure(format!(
                "version manifest {} returned {}",
                self.path, snapshot.status
            )));
        }

        let version = String::from_utf8_lossy(&snapshot.body).trim().to_string();
        if version.is_empty() || version.contains(['/', '\\']) {
            return Err(CacheError::RegistrationFailure(format!(
                "invalid version '{}' from {}",
                version, self.path
            )));
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StubFetcher;

    #[tokio::test]
    async fn test_fixed_version_publish() {
        let source = FixedVersion::new("v1.0.0");
        let shared = source.clone();
        assert_eq!(source.latest_version().await.unwrap(), "v1.0.0");

        shared.publish("v1.0.1");
        assert_eq!(source.latest_version().await.unwrap(), "v1.0.1");
    }

    #[tokio::test]
    async fn test_origin_version_reads_manifest() {
        let stub = Arc::new(StubFetcher::new());
        stub.route_text("/version", "v2.3.4\n");
        let source = OriginVersion::new(stub.clone(), "/version");

        assert_eq!(source.latest_version().await.unwrap(), "v2.3.4");
    }

    #[tokio::test]
    async fn test_origin_version_rejects_bad_manifest() {
        let stub = Arc::new(StubFetcher::new());
        stub.route_text("/version", "  ");
        let source = OriginVersion::new(stub.clone(), "/version");
        assert!(source.latest_version().await.is_err());

        let missing = OriginVersion::new(stub, "/nope");
        assert!(matches!(
            missing.latest_version().await,
            Err(CacheError::RegistrationFailure(_))
        ));
    }
}
