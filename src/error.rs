//! Gateway error types.
//!
//! [`GatewayError`] is the error type of the REST surface; each variant maps
//! to an HTTP status code and a structured JSON error response.
//! [`RelayError`] classifies failures on relayed WebSocket connections. Relay
//! errors are never sent to clients: they decide whether a message is dropped
//! or a connection is closed, and they are logged.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::Service;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3002,
///     "message": "upstream request failed: connection refused",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request, 404 Not Found |
/// | 2000–2999 | Availability    | 503 Service Unavailable      |
/// | 3000–3999 | Server/Upstream | 500 / 502                    |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator backing this route is not configured.
    #[error("{0} is not configured")]
    ServiceDisabled(&'static str),

    /// An upstream HTTP call failed before a response was received.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Credential minting failed.
    #[error("Unable to generate TURN credentials")]
    CredentialMinting(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound(_) => 1004,
            Self::ServiceDisabled(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Config(_) => 3001,
            Self::Upstream(_) => 3002,
            Self::CredentialMinting(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceDisabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::CredentialMinting(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Upstream detail stays in the logs, not in the response.
        if let Self::CredentialMinting(detail) = &self {
            tracing::error!(error = %detail, "credential minting failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Failure classes on relayed WebSocket connections.
///
/// | Variant               | Effect                                          |
/// |-----------------------|-------------------------------------------------|
/// | `ProtocolViolation`   | message dropped, or connection closed at routing |
/// | `UpstreamUnavailable` | connection closed at routing time               |
/// | `UpstreamFailure`     | dependent client connection(s) closed           |
/// | `TransactionMismatch` | upstream message dropped                        |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Malformed or unexpected client message.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The requested backend has no configured address.
    #[error("{0} backend is not configured")]
    UpstreamUnavailable(Service),

    /// The backend connection could not be established, was lost, or
    /// rejected the session.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// A response referenced an unknown or already consumed transaction.
    #[error("unknown transaction: {0}")]
    TransactionMismatch(String),
}

impl RelayError {
    /// Returns `true` if the error ends the affected connection.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::UpstreamFailure(_)
        )
    }
}
