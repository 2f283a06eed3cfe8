//! HTTP application assembly.

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete application: relay upgrade routes, REST routes and
/// static assets as the fallback.
pub fn build_app(state: AppState) -> Router {
    let ws_path = state.config.ws_path.clone();
    let api_path = state.config.api_path.clone();
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .route(&ws_path, get(ws_handler))
        .route(&format!("{ws_path}/{{*rest}}"), get(ws_handler))
        .merge(api::build_router(&api_path))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
