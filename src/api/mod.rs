//! REST API layer: route handlers, OpenAPI document and router composition.
//!
//! The OP25 passthrough and TURN endpoints are mounted under the
//! configured API prefix (default `/api`); system endpoints live at the
//! root.

pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::TurnCredentials;

/// OpenAPI description of the REST surface, assuming the default prefix.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "op25-gateway", description = "REST surface of the OP25 web gateway"),
    paths(
        handlers::system::health_handler,
        handlers::system::config_js_handler,
        handlers::op25::forward_op25,
        handlers::turn::turn_credentials,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        TurnCredentials,
        handlers::system::HealthResponse,
        handlers::system::RelayHealth,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with API routes nested under `api_path`.
pub fn build_router(api_path: &str) -> Router<AppState> {
    let router = Router::new()
        .nest(api_path, handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/config.js", "/api/op25/{endpoint}", "/api/turn-credentials"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn op25_route_documents_a_json_body() {
        let doc = ApiDoc::openapi();
        let body = doc
            .paths
            .paths
            .get("/api/op25/{endpoint}")
            .and_then(|item| item.post.as_ref())
            .and_then(|op| op.request_body.as_ref());
        assert!(body.is_some_and(|b| b.content.contains_key("application/json")));
    }
}
