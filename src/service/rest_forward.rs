//! Single-shot forwarding of OP25 REST calls.

use std::fmt;

use axum::http::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::RestSettings;
use crate::error::GatewayError;

/// OP25 API endpoints exposed through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op25Endpoint {
    /// `POST update`
    Update,
    /// `POST hold`
    Hold,
    /// `POST release_hold`
    ReleaseHold,
    /// `POST skip`
    Skip,
    /// `GET`/`POST whitelist`
    Whitelist,
    /// `GET`/`POST blacklist`
    Blacklist,
    /// `GET`/`POST talkgroups`
    Talkgroups,
    /// `GET status`
    Status,
    /// `GET logs`
    Logs,
}

impl Op25Endpoint {
    /// Every exposed endpoint.
    pub const ALL: [Self; 9] = [
        Self::Update,
        Self::Hold,
        Self::ReleaseHold,
        Self::Skip,
        Self::Whitelist,
        Self::Blacklist,
        Self::Talkgroups,
        Self::Status,
        Self::Logs,
    ];

    /// Looks up an endpoint by its path segment.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.as_str() == segment)
    }

    /// Path segment of this endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Hold => "hold",
            Self::ReleaseHold => "release_hold",
            Self::Skip => "skip",
            Self::Whitelist => "whitelist",
            Self::Blacklist => "blacklist",
            Self::Talkgroups => "talkgroups",
            Self::Status => "status",
            Self::Logs => "logs",
        }
    }

    /// Returns `true` if `method` may be forwarded to this endpoint.
    #[must_use]
    pub fn allows(self, method: &Method) -> bool {
        match self {
            Self::Update | Self::Hold | Self::ReleaseHold | Self::Skip => *method == Method::POST,
            Self::Whitelist | Self::Blacklist | Self::Talkgroups => {
                *method == Method::GET || *method == Method::POST
            }
            Self::Status | Self::Logs => *method == Method::GET,
        }
    }
}

impl fmt::Display for Op25Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend reply, passed through to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedResponse {
    /// Backend status code.
    pub status: StatusCode,
    /// Backend body. Non-JSON bodies are carried as a JSON string.
    pub body: Value,
}

/// Forwards REST calls to the OP25 HTTP API.
#[derive(Debug, Clone)]
pub struct RestForwarder {
    client: reqwest::Client,
    settings: RestSettings,
}

impl RestForwarder {
    /// Creates a forwarder with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the HTTP client cannot be built.
    pub fn new(settings: RestSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("OP25 REST client: {e}")))?;
        Ok(Self { client, settings })
    }

    /// Backend URL for `endpoint`.
    #[must_use]
    pub fn target_url(&self, endpoint: Op25Endpoint) -> String {
        format!("{}/api/{endpoint}", self.settings.base_url)
    }

    /// Sends one request and returns the backend's reply unchanged.
    ///
    /// The configured token, when present, replaces the caller's
    /// `Authorization` header.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] if `method` is not allowed on `endpoint`.
    /// - [`GatewayError::Upstream`] if the backend cannot be reached or its
    ///   body cannot be read.
    pub async fn forward(
        &self,
        method: Method,
        endpoint: Op25Endpoint,
        authorization: Option<&str>,
        body: Option<Value>,
    ) -> Result<ForwardedResponse, GatewayError> {
        if !endpoint.allows(&method) {
            return Err(GatewayError::InvalidRequest(format!(
                "{method} is not supported on {endpoint}"
            )));
        }

        let url = self.target_url(endpoint);
        debug!(%method, %url, "forwarding op25 request");
        let mut request = self.client.request(method, &url);
        if let Some(auth) = self.settings.secret_token.as_deref().or(authorization) {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        debug!(%url, status = status.as_u16(), "op25 response received");
        Ok(ForwardedResponse { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn segments_round_trip() {
        for endpoint in Op25Endpoint::ALL {
            assert_eq!(Op25Endpoint::from_segment(endpoint.as_str()), Some(endpoint));
        }
        assert_eq!(Op25Endpoint::from_segment("reboot"), None);
    }

    #[test]
    fn method_allowlist() {
        assert!(Op25Endpoint::Hold.allows(&Method::POST));
        assert!(!Op25Endpoint::Hold.allows(&Method::GET));
        assert!(Op25Endpoint::Talkgroups.allows(&Method::GET));
        assert!(Op25Endpoint::Talkgroups.allows(&Method::POST));
        assert!(Op25Endpoint::Status.allows(&Method::GET));
        assert!(!Op25Endpoint::Logs.allows(&Method::DELETE));
    }

    #[tokio::test]
    async fn disallowed_method_is_rejected_before_sending() {
        let Ok(forwarder) = RestForwarder::new(RestSettings {
            base_url: "http://op25.test:8080".to_string(),
            secret_token: None,
            timeout: Duration::from_secs(1),
        }) else {
            panic!("client should build");
        };
        assert_eq!(
            forwarder.target_url(Op25Endpoint::ReleaseHold),
            "http://op25.test:8080/api/release_hold"
        );

        let result = forwarder.forward(Method::GET, Op25Endpoint::Skip, None, None).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
}
