//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use tracing::debug;

use super::router::route_connection;
use crate::app_state::AppState;
use crate::domain::ConnectionId;

/// `GET /ws` and `GET /ws/*`: upgrade to WebSocket and route the client.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let conn_id = ConnectionId::new();
    debug!(%conn_id, "upgrading client connection");
    ws.on_upgrade(move |socket| route_connection(socket, state, conn_id))
}
