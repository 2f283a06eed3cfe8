//! TURN credential endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::TurnCredentials;

/// `GET /turn-credentials` — Mint short-lived TURN credentials.
///
/// # Errors
///
/// Returns [`GatewayError::ServiceDisabled`] if minting is not configured
/// and [`GatewayError::CredentialMinting`] if the credential service fails.
#[utoipa::path(
    get,
    path = "/api/turn-credentials",
    tag = "TURN",
    summary = "Generate TURN credentials",
    description = "Requests credentials from the configured TURN provider with the configured TTL and identifier.",
    responses(
        (status = 200, description = "Fresh credentials", body = TurnCredentials),
        (status = 500, description = "Provider failure", body = ErrorResponse),
        (status = 503, description = "Minting not configured", body = ErrorResponse),
    )
)]
pub async fn turn_credentials(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let minter = state
        .turn
        .as_ref()
        .ok_or(GatewayError::ServiceDisabled("TURN credential minting"))?;
    Ok(Json(minter.mint().await?))
}

/// TURN routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/turn-credentials", get(turn_credentials))
}
