//! OP25 REST passthrough.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::Op25Endpoint;

/// `GET|POST /op25/{endpoint}` — Forward a control call to OP25.
///
/// The backend's status and JSON body are returned unchanged.
///
/// # Errors
///
/// Returns [`GatewayError`] if the passthrough is disabled, the endpoint is
/// unknown, the method is not allowed, the body is not JSON, or the backend
/// cannot be reached.
#[utoipa::path(
    post,
    path = "/api/op25/{endpoint}",
    tag = "OP25",
    summary = "Forward an OP25 API call",
    description = "Forwards the request to `{TARGET_OP25_API_URL}/api/{endpoint}`. POST: update, hold, release_hold, skip, whitelist, blacklist, talkgroups. GET: whitelist, blacklist, talkgroups, status, logs.",
    request_body(content = Option<Value>, content_type = "application/json", description = "JSON payload for POST endpoints"),
    params(("endpoint" = String, Path, description = "OP25 API endpoint")),
    responses(
        (status = 200, description = "OP25 response, passed through unchanged"),
        (status = 400, description = "Method not allowed on endpoint or malformed body", body = ErrorResponse),
        (status = 404, description = "Unknown endpoint", body = ErrorResponse),
        (status = 502, description = "OP25 unreachable", body = ErrorResponse),
        (status = 503, description = "Passthrough not configured", body = ErrorResponse),
    )
)]
pub async fn forward_op25(
    State(state): State<AppState>,
    method: Method,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let forwarder = state
        .rest
        .as_ref()
        .ok_or(GatewayError::ServiceDisabled("OP25 REST API"))?;
    let endpoint = Op25Endpoint::from_segment(&endpoint)
        .ok_or_else(|| GatewayError::NotFound(format!("op25 endpoint {endpoint}")))?;

    let payload = if body.is_empty() {
        None
    } else {
        Some(
            serde_json::from_slice::<Value>(&body)
                .map_err(|e| GatewayError::InvalidRequest(format!("body is not JSON: {e}")))?,
        )
    };
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());

    let response = forwarder
        .forward(method, endpoint, authorization, payload)
        .await?;
    Ok((response.status, Json(response.body)))
}

/// OP25 passthrough routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/op25/{endpoint}", get(forward_op25).post(forward_op25))
}
