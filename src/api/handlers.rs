//! API Handlers
//!
//! HTTP request handlers for each control server endpoint.

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::cache::Snapshot;
use crate::error::{CacheError, Result};
use crate::manager::CacheManager;
use crate::messaging::{ControlMessage, ControlReply};
use crate::models::{
    CacheSizeResponse, ClearResponse, ConnectivityRequest, ConnectivityResponse, DeliveryResponse,
    HealthResponse, PrefetchRequest, RegistrationResponse, StatsResponse, UnregisterResponse,
    UpdateResponse,
};
use crate::network::{RequestMode, ResourceRequest};
use crate::prefetch::PrefetchReport;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: CacheManager,
}

impl AppState {
    pub fn new(manager: CacheManager) -> Self {
        Self { manager }
    }
}

/// Handler for POST /registration
pub async fn register_handler(State(state): State<AppState>) -> Json<RegistrationResponse> {
    let handle = state.manager.register_caching_process().await;
    Json(RegistrationResponse::from_handle(handle.as_deref()))
}

/// Handler for DELETE /registration
pub async fn unregister_handler(State(state): State<AppState>) -> Json<UnregisterResponse> {
    Json(UnregisterResponse {
        unregistered: state.manager.unregister_caching_process().await,
    })
}

/// Handler for POST /update/check
pub async fn check_update_handler(State(state): State<AppState>) -> Json<UpdateResponse> {
    state.manager.check_for_update().await;
    Json(update_status(&state.manager))
}

/// Handler for POST /update/activate
///
/// Posts `SKIP_WAITING`; activation happens in the caching process.
pub async fn activate_handler(State(state): State<AppState>) -> Result<(StatusCode, Json<DeliveryResponse>)> {
    state.manager.post_message(ControlMessage::SkipWaiting)?;
    Ok((StatusCode::ACCEPTED, Json(DeliveryResponse::delivered("SKIP_WAITING"))))
}

fn update_status(manager: &CacheManager) -> UpdateResponse {
    let lifecycle = manager.lifecycle();
    UpdateResponse {
        active_version: lifecycle.active_version(),
        waiting_version: lifecycle.waiting().map(|h| h.version().to_string()),
        open_clients: lifecycle.open_clients(),
    }
}

/// Handler for DELETE /caches
pub async fn clear_caches_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let deleted = state.manager.clear_all_caches().await?;
    Ok(Json(ClearResponse { deleted }))
}

/// Handler for GET /caches/size
pub async fn cache_size_handler(State(state): State<AppState>) -> Result<Json<CacheSizeResponse>> {
    let bytes = state.manager.get_cache_size().await?;
    Ok(Json(CacheSizeResponse::new(bytes)))
}

/// Handler for GET /connectivity
pub async fn connectivity_handler(State(state): State<AppState>) -> Json<ConnectivityResponse> {
    Json(ConnectivityResponse {
        online: !state.manager.is_offline(),
        changed: None,
    })
}

/// Handler for PUT /connectivity
///
/// Feeds the host's reachability signal.
pub async fn set_connectivity_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    let changed = state.manager.set_online(req.online);
    Json(ConnectivityResponse {
        online: req.online,
        changed: Some(changed),
    })
}

/// Handler for POST /prefetch
pub async fn prefetch_handler(
    State(state): State<AppState>,
    Json(req): Json<PrefetchRequest>,
) -> Result<Json<PrefetchReport>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    Ok(Json(state.manager.prefetch_urls(&req.urls).await))
}

/// Handler for POST /messages
///
/// Delivers a control message and returns the caching process's reply.
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> Result<Json<ControlReply>> {
    Ok(Json(state.manager.request(message).await?))
}

/// Handler for /fetch/*path
///
/// The interception point: the request is answered by the caching layer.
pub async fn fetch_handler(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    intercept(&state.manager, method, &path, query, &headers).await
}

/// Handler for /fetch/
pub async fn fetch_root_handler(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response> {
    intercept(&state.manager, method, "", query, &headers).await
}

async fn intercept(
    manager: &CacheManager,
    method: Method,
    path: &str,
    query: Option<String>,
    headers: &HeaderMap,
) -> Result<Response> {
    let mut url = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = query {
        url.push('?');
        url.push_str(&query);
    }

    let request = ResourceRequest {
        url,
        method: method.as_str().to_string(),
        mode: request_mode(headers),
    };
    let snapshot = manager.handle_request(request).await?;
    Ok(snapshot_response(snapshot))
}

/// Navigation if the client says so, or if it asks for a document.
fn request_mode(headers: &HeaderMap) -> RequestMode {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase()
    };

    if header_value("sec-fetch-mode") == "navigate" || header_value("accept").starts_with("text/html") {
        RequestMode::Navigate
    } else {
        RequestMode::Subresource
    }
}

fn snapshot_response(snapshot: Snapshot) -> Response {
    let status = StatusCode::from_u16(snapshot.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = snapshot
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok());

    let mut response = (status, snapshot.body).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    response
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.manager.active_version(),
        state.manager.stats(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
