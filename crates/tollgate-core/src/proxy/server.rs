//! HTTP entry adapter: every method on every path goes to the orchestrator.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
    Router,
};
use std::net::IpAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::headers::{X_FORWARDED_FOR, X_REAL_IP};
use super::orchestrator::{InboundCall, Orchestrator};

/// Request bodies above this size are rejected by axum before mediation.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the proxy router. Callers may add their own routes (e.g. health)
/// on top; anything unmatched is mediated.
pub fn build_proxy_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .fallback(handle_call)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { orchestrator })
}

async fn handle_call(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = InboundCall {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        client_ip: extract_client_ip(&headers).map(|ip| ip.to_string()),
        headers,
        body,
    };

    let response = state.orchestrator.handle(call).await;
    response.into_http(state.orchestrator.cors_headers())
}

/// Source address from proxy headers (`x-forwarded-for`, then `x-real-ip`).
pub fn extract_client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .or_else(|| {
            headers
                .get(X_REAL_IP)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
        })
}
