//! Request DTOs for the control server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest URL accepted for prefetching
const MAX_URL_LEN: usize = 2048;

/// Request body for POST /prefetch
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchRequest {
    /// URLs to seed into the pages tier
    pub urls: Vec<String>,
}

impl PrefetchRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.urls.is_empty() {
            return Some("At least one URL is required".to_string());
        }
        if let Some(url) = self.urls.iter().find(|u| u.trim().is_empty()) {
            return Some(format!("Invalid URL '{}'", url));
        }
        if self.urls.iter().any(|u| u.len() > MAX_URL_LEN) {
            return Some(format!("URL exceeds maximum length of {} characters", MAX_URL_LEN));
        }
        None
    }
}

/// Request body for PUT /connectivity
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_request_deserialize() {
        let json = r#"{"urls": ["/", "/about/"]}"#;
        let req: PrefetchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.urls, vec!["/", "/about/"]);
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_list() {
        let req = PrefetchRequest { urls: Vec::new() };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_blank_url() {
        let req = PrefetchRequest {
            urls: vec!["/".to_string(), "  ".to_string()],
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_url() {
        let req = PrefetchRequest {
            urls: vec![format!("/{}", "a".repeat(MAX_URL_LEN))],
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_connectivity_request_deserialize() {
        let req: ConnectivityRequest = serde_json::from_str(r#"{"online": false}"#).unwrap();
        assert!(!req.online);
    }
}
