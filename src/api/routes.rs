//! API Routes
//!
//! Configures the Axum router with all control server endpoints.

use axum::{
    routing::{any, delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    activate_handler, cache_size_handler, check_update_handler, clear_caches_handler,
    connectivity_handler, fetch_handler, fetch_root_handler, health_handler, message_handler,
    prefetch_handler, register_handler, set_connectivity_handler, stats_handler,
    unregister_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /registration` - Register the caching process
/// - `DELETE /registration` - Unregister it
/// - `POST /update/check` - Look for a newly deployed version
/// - `POST /update/activate` - Skip waiting
/// - `DELETE /caches` - Delete every namespace
/// - `GET /caches/size` - Total cached bytes
/// - `GET|PUT /connectivity` - Read or feed the online state
/// - `POST /prefetch` - Seed the pages tier
/// - `POST /messages` - Deliver a control message
/// - `ANY /fetch/*path` - Resource requests through the cache
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/registration", post(register_handler).delete(unregister_handler))
        .route("/update/check", post(check_update_handler))
        .route("/update/activate", post(activate_handler))
        .route("/caches", delete(clear_caches_handler))
        .route("/caches/size", get(cache_size_handler))
        .route(
            "/connectivity",
            get(connectivity_handler).put(set_connectivity_handler),
        )
        .route("/prefetch", post(prefetch_handler))
        .route("/messages", post(message_handler))
        .route("/fetch/", any(fetch_root_handler))
        .route("/fetch/*path", any(fetch_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::config::Config;
    use crate::lifecycle::FixedVersion;
    use crate::manager::CacheManager;
    use crate::network::StubFetcher;
    use crate::storage::MemoryStorage;

    fn create_test_app() -> Router {
        let origin = Arc::new(StubFetcher::new());
        origin.route_text("/", "home").route_text("/offline", "offline");
        let manager = CacheManager::new(
            Config::default(),
            Arc::new(MemoryStorage::new()),
            origin,
            Arc::new(FixedVersion::new("v1.0.0")),
        )
        .unwrap();
        create_router(AppState::new(manager))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_registration_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/registration")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fetch_root_passes_through() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fetch/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_activate_without_process_conflicts() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update/activate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
