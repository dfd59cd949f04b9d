//! Response DTOs for the control server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{format_cache_size, CacheStats};
use crate::lifecycle::{LifecycleState, RegistrationHandle};

/// Response body for POST /registration
///
/// `registered` is false when the host has no support or registration was
/// rejected; the other fields are then null.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub registered: bool,
    pub version: Option<String>,
    pub state: Option<LifecycleState>,
}

impl RegistrationResponse {
    pub fn from_handle(handle: Option<&RegistrationHandle>) -> Self {
        Self {
            registered: handle.is_some(),
            version: handle.map(|h| h.version().to_string()),
            state: handle.map(|h| h.state()),
        }
    }
}

/// Response body for DELETE /registration
#[derive(Debug, Clone, Serialize)]
pub struct UnregisterResponse {
    pub unregistered: bool,
}

/// Response body for POST /update/check
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    /// Version controlling clients
    pub active_version: Option<String>,
    /// Installed version held back by open clients
    pub waiting_version: Option<String>,
    pub open_clients: usize,
}

/// Response body for POST /update/activate
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryResponse {
    pub delivered: bool,
    pub message: String,
}

impl DeliveryResponse {
    pub fn delivered(message: impl Into<String>) -> Self {
        Self {
            delivered: true,
            message: message.into(),
        }
    }
}

/// Response body for DELETE /caches
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Number of namespaces deleted
    pub deleted: usize,
}

/// Response body for GET /caches/size
#[derive(Debug, Clone, Serialize)]
pub struct CacheSizeResponse {
    pub bytes: u64,
    /// Human-readable size, e.g. "1.5 KB"
    pub formatted: String,
}

impl CacheSizeResponse {
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes,
            formatted: format_cache_size(bytes),
        }
    }
}

/// Response body for GET/PUT /connectivity
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResponse {
    pub online: bool,
    /// Whether the PUT was a genuine transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub active_version: Option<String>,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(active_version: Option<String>, stats: CacheStats) -> Self {
        Self {
            active_version,
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_response_serialize() {
        let resp = RegistrationResponse::from_handle(None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["registered"], false);
        assert!(json["version"].is_null());
    }

    #[test]
    fn test_cache_size_response_formats() {
        let resp = CacheSizeResponse::new(1536);
        assert_eq!(resp.formatted, "1.5 KB");
    }

    #[test]
    fn test_connectivity_response_omits_changed() {
        let json = serde_json::to_string(&ConnectivityResponse {
            online: true,
            changed: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"online":true}"#);
    }

    #[test]
    fn test_stats_response_flattens_counters() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new(Some("v1".to_string()), stats);
        assert!((resp.hit_rate - 0.8).abs() < 0.001);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hits"], 80);
        assert_eq!(json["active_version"], "v1");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
