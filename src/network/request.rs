//! Resource requests as seen by the interception point.

use serde::{Deserialize, Serialize};

// == Request Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Top-level document load; may be answered with the offline document
    Navigate,
    #[default]
    Subresource,
}

// == Resource Request ==
/// An outgoing resource request from the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Absolute URL, or a path relative to the configured origin
    pub url: String,
    /// Upper-case HTTP method
    pub method: String,
    pub mode: RequestMode,
}

impl ResourceRequest {
    /// A GET subresource request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            mode: RequestMode::Subresource,
        }
    }

    /// A GET navigation request.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Resource key: path+query for same-origin URLs, the full URL otherwise.
    pub fn key(&self, origin: &str) -> String {
        resource_key(&self.url, origin)
    }
}

/// Normalizes a URL into the key used by tiers and storage.
pub fn resource_key(url: &str, origin: &str) -> String {
    let origin = origin.trim_end_matches('/');
    if !origin.is_empty() {
        if let Some(rest) = url.strip_prefix(origin) {
            if rest.is_empty() {
                return "/".to_string();
            }
            if rest.starts_with(['/', '?', '#']) {
                return if rest.starts_with('/') {
                    rest.to_string()
                } else {
                    format!("/{}", rest)
                };
            }
        }
    }

    if is_absolute(url) || url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Returns true for `http://` and `https://` URLs.
pub fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
