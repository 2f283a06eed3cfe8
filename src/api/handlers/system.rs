//! System endpoints: health check and browser configuration script.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    /// Whether a Janus backend is configured.
    janus_configured: bool,
    /// OP25 relay status, absent when OP25 is not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    op25: Option<RelayHealth>,
}

/// Shared OP25 relay status.
#[derive(Debug, Serialize, ToSchema)]
pub struct RelayHealth {
    upstream_open: bool,
    subscribers: usize,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and relay status.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let op25 = match &state.relay {
        Some(relay) => Some(RelayHealth {
            upstream_open: relay.is_upstream_open().await,
            subscribers: relay.subscriber_count().await,
        }),
        None => None,
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            janus_configured: state.config.signaling.is_some(),
            op25,
        }),
    )
}

/// `GET /config.js` — Gateway endpoints for the browser client.
#[utoipa::path(
    get,
    path = "/config.js",
    tag = "System",
    summary = "Browser configuration",
    description = "JavaScript that sets `window.config` to the public WebSocket and REST URLs of this gateway.",
    responses(
        (status = 200, description = "Configuration script", content_type = "application/javascript", body = String),
    )
)]
pub async fn config_js_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ws_url = Value::String(state.config.public_ws_url());
    let api_url = Value::String(state.config.public_api_url());
    let script = format!(
        "window.config = {{\n  gateway_ws_url: {ws_url},\n  gateway_api_url: {api_url}\n}};\n"
    );
    (
        [
            (CONTENT_TYPE, "application/javascript"),
            (CACHE_CONTROL, "no-store, no-cache, must-revalidate, proxy-revalidate"),
        ],
        script,
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config.js", get(config_js_handler))
}
