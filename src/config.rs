//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Each backend has its own optional
//! sub-config; a backend is considered configured exactly when its
//! sub-config is present.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::GatewayError;

/// Settings for the Janus signaling backend.
#[derive(Debug, Clone)]
pub struct SignalingSettings {
    /// WebSocket URL of the Janus server (e.g. `ws://janus:8188`).
    pub ws_url: String,
    /// Optional `apisecret` attached to every request.
    pub api_secret: Option<String>,
    /// Period between session keepalives.
    pub keepalive_interval: Duration,
}

/// Settings for the OP25 telemetry backend.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// WebSocket URL of the OP25 telemetry stream.
    pub ws_url: String,
    /// Optional `Authorization` value presented to the backend.
    pub secret_token: Option<String>,
    /// Fixed delay between upstream reconnect attempts.
    pub reconnect_delay: Duration,
    /// Capacity of each subscriber's outbound queue.
    pub subscriber_buffer: usize,
}

/// Settings for the OP25 REST passthrough.
#[derive(Debug, Clone)]
pub struct RestSettings {
    /// Base URL of the OP25 HTTP API (e.g. `http://op25:8080`).
    pub base_url: String,
    /// Optional `Authorization` value overriding the caller's header.
    pub secret_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Settings for TURN credential minting.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Base URL of the credential service.
    pub api_base_url: String,
    /// TURN key identifier.
    pub key_id: String,
    /// Bearer token for the credential service.
    pub api_token: String,
    /// Requested credential lifetime in seconds.
    pub credential_ttl: u64,
    /// Identifier attached to minted credentials.
    pub custom_identifier: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Public base URL advertised to browsers, if different from the
    /// listen address.
    pub public_url: Option<String>,

    /// Path prefix accepting WebSocket upgrades.
    pub ws_path: String,

    /// Path prefix for the REST endpoints.
    pub api_path: String,

    /// Directory served as static assets.
    pub static_dir: String,

    /// How long the service router waits for the routing message.
    pub handshake_timeout: Duration,

    /// Janus backend; `None` disables the `janus` service.
    pub signaling: Option<SignalingSettings>,

    /// OP25 telemetry backend; `None` disables the `op25` service.
    pub telemetry: Option<TelemetrySettings>,

    /// OP25 REST backend; `None` disables the passthrough routes.
    pub rest: Option<RestSettings>,

    /// TURN credential service; `None` disables credential minting.
    pub turn: Option<TurnSettings>,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file,
    /// then delegates to [`GatewayConfig::from_lookup`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `GATEWAY_LISTEN_ADDR` is set but
    /// cannot be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the listen address is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parse = |key: &str, default: u64| -> u64 {
            get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        let listen_addr: SocketAddr = get("GATEWAY_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("GATEWAY_LISTEN_ADDR: {e}")))?;

        let upstream_timeout = Duration::from_secs(parse("UPSTREAM_HTTP_TIMEOUT_SECS", 30));

        let signaling = get("TARGET_JANUS_WS_URL").map(|ws_url| SignalingSettings {
            ws_url,
            api_secret: get("TARGET_JANUS_API_SECRET"),
            keepalive_interval: Duration::from_secs(parse("JANUS_KEEPALIVE_SECS", 30).max(1)),
        });

        let op25_token = get("TARGET_OP25_API_SECRET_TOKEN");

        let telemetry = get("TARGET_OP25_WS_URL").map(|ws_url| TelemetrySettings {
            ws_url,
            secret_token: op25_token.clone(),
            reconnect_delay: Duration::from_millis(parse("OP25_RECONNECT_DELAY_MS", 2_000)),
            subscriber_buffer: usize::try_from(parse("SUBSCRIBER_BUFFER", 256))
                .unwrap_or(256)
                .max(1),
        });

        let rest = get("TARGET_OP25_API_URL").map(|base_url| RestSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_token: op25_token,
            timeout: upstream_timeout,
        });

        let turn = match (get("TARGET_TURN_KEY_ID"), get("TARGET_TURN_API_TOKEN")) {
            (Some(key_id), Some(api_token)) => Some(TurnSettings {
                api_base_url: get("TURN_API_BASE_URL")
                    .unwrap_or_else(|| "https://rtc.live.cloudflare.com/v1".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                key_id,
                api_token,
                credential_ttl: parse("TARGET_TURN_CREDENTIAL_TTL", 86_400),
                custom_identifier: get("TARGET_TURN_CUSTOM_IDENTIFIER")
                    .unwrap_or_else(|| "op25_web_gateway".to_string()),
                timeout: upstream_timeout,
            }),
            _ => None,
        };

        Ok(Self {
            listen_addr,
            public_url: get("GATEWAY_URL").map(|u| u.trim_end_matches('/').to_string()),
            ws_path: normalize_path(get("GATEWAY_WS_PATH"), "/ws"),
            api_path: normalize_path(get("GATEWAY_API_PATH"), "/api"),
            static_dir: get("GATEWAY_STATIC_DIR").unwrap_or_else(|| "public".to_string()),
            handshake_timeout: Duration::from_secs(parse("WS_HANDSHAKE_TIMEOUT_SECS", 10).max(1)),
            signaling,
            telemetry,
            rest,
            turn,
        })
    }

    /// Public HTTP base URL, falling back to `http://localhost:<port>`.
    #[must_use]
    pub fn public_http_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.listen_addr.port()))
    }

    /// Public WebSocket URL of the relay endpoint.
    #[must_use]
    pub fn public_ws_url(&self) -> String {
        let http = self.public_http_url();
        let host = http
            .strip_prefix("https://")
            .map(|rest| format!("wss://{rest}"))
            .or_else(|| http.strip_prefix("http://").map(|rest| format!("ws://{rest}")))
            .unwrap_or(http);
        format!("{host}{}", self.ws_path)
    }

    /// Public URL of the REST API.
    #[must_use]
    pub fn public_api_url(&self) -> String {
        format!("{}{}", self.public_http_url(), self.api_path)
    }
}

/// Ensures a route prefix starts with `/` and has no trailing slash.
fn normalize_path(value: Option<String>, default: &str) -> String {
    let raw = value.unwrap_or_else(|| default.to_string());
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        default.to_string()
    } else {
        format!("/{trimmed}")
    }
}
