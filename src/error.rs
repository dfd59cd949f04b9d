//! Error types for the caching layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching layer.
///
/// None of these are fatal to the hosting application: callers degrade to
/// "no caching" and only `ResourceUnavailable` is meant to reach the UI.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Host has no support for a caching process
    #[error("Feature unsupported: {0}")]
    FeatureUnsupported(String),

    /// Registration was rejected by the host
    #[error("Registration failed: {0}")]
    RegistrationFailure(String),

    /// Both network and cache were exhausted for a resource
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Storage quota or backend error while writing an entry
    #[error("Cache write failed: {0}")]
    CacheWriteFailure(String),

    /// No active process was ready to receive a control message
    #[error("Message not delivered: {0}")]
    MessageDeliveryFailure(String),

    /// Invalid tier table or match rule
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Upstream fetch failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Storage backend failure outside of a write
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::ResourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::MessageDeliveryFailure(_) => StatusCode::CONFLICT,
            CacheError::FeatureUnsupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Network(_) => StatusCode::BAD_GATEWAY,
            CacheError::RegistrationFailure(_)
            | CacheError::CacheWriteFailure(_)
            | CacheError::Configuration(_)
            | CacheError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching layer.
pub type Result<T> = std::result::Result<T, CacheError>;
