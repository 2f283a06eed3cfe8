//! REST endpoint handlers organized by resource.

pub mod op25;
pub mod system;
pub mod turn;

use axum::Router;

use crate::app_state::AppState;

/// Composes the routes mounted under the API prefix.
pub fn routes() -> Router<AppState> {
    Router::new().merge(op25::routes()).merge(turn::routes())
}
