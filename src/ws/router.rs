//! Service router: reads the routing message and hands the connection off.
//!
//! Every accepted client sends exactly one routing message,
//! `{"service": "janus" | "op25"}`, before any relaying starts. A connection
//! that sends anything else, names a service that is not configured, or
//! stays silent past the handshake timeout is closed without a payload.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::broadcast::{BroadcastRelay, run_subscriber};
use crate::config::SignalingSettings;
use crate::domain::{ConnectionId, Service};
use crate::error::RelayError;
use crate::signaling::run_signaling_proxy;

/// Where a routed connection goes.
#[derive(Debug)]
pub enum Route {
    /// A dedicated Janus session.
    Signaling(SignalingSettings),
    /// The shared OP25 relay.
    Telemetry(Arc<BroadcastRelay>),
}

/// Parses a routing message.
///
/// # Errors
///
/// Returns [`RelayError::ProtocolViolation`] if the payload is not JSON,
/// has no string `service` field, or names an unknown service.
pub fn parse_routing_message(payload: &[u8]) -> Result<Service, RelayError> {
    let message: Value = serde_json::from_slice(payload)
        .map_err(|e| RelayError::ProtocolViolation(format!("malformed routing message: {e}")))?;
    let selector = message
        .get("service")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::ProtocolViolation("missing service selector".to_string()))?;
    Service::from_selector(selector)
        .ok_or_else(|| RelayError::ProtocolViolation(format!("unknown service: {selector}")))
}

/// Resolves a service against the configured backends.
///
/// # Errors
///
/// Returns [`RelayError::UpstreamUnavailable`] if the backend for `service`
/// is not configured.
pub fn resolve(service: Service, state: &AppState) -> Result<Route, RelayError> {
    match service {
        Service::Janus => state
            .config
            .signaling
            .clone()
            .map(Route::Signaling)
            .ok_or(RelayError::UpstreamUnavailable(service)),
        Service::Op25 => state
            .relay
            .as_ref()
            .map(|relay| Route::Telemetry(Arc::clone(relay)))
            .ok_or(RelayError::UpstreamUnavailable(service)),
    }
}

/// Waits for the routing message and dispatches the connection.
pub async fn route_connection(mut socket: WebSocket, state: AppState, conn_id: ConnectionId) {
    let handshake = tokio::time::timeout(state.config.handshake_timeout, first_payload(&mut socket));
    let payload = match handshake.await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            info!(%conn_id, "client left before routing");
            return;
        }
        Err(_) => {
            let err = RelayError::ProtocolViolation("handshake timed out".to_string());
            reject(socket, conn_id, &err).await;
            return;
        }
    };

    let route = parse_routing_message(&payload).and_then(|service| resolve(service, &state));
    match route {
        Ok(Route::Signaling(settings)) => {
            info!(%conn_id, service = %Service::Janus, "client routed");
            run_signaling_proxy(socket, settings, conn_id).await;
        }
        Ok(Route::Telemetry(relay)) => {
            info!(%conn_id, service = %Service::Op25, "client routed");
            run_subscriber(socket, relay, conn_id).await;
        }
        Err(err) => reject(socket, conn_id, &err).await,
    }
}

/// Reads until the first data frame. `None` if the client goes away first.
async fn first_payload(socket: &mut WebSocket) -> Option<Vec<u8>> {
    loop {
        match socket.recv().await? {
            Ok(Message::Text(text)) => return Some(text.as_str().as_bytes().to_vec()),
            Ok(Message::Binary(data)) => return Some(data.to_vec()),
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) | Err(_) => return None,
        }
    }
}

async fn reject(mut socket: WebSocket, conn_id: ConnectionId, err: &RelayError) {
    if err.is_fatal() {
        error!(%conn_id, error = %err, "closing unrouted client");
    } else {
        warn!(%conn_id, error = %err, "closing unrouted client");
    }
    let _ = socket.send(Message::Close(None)).await;
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{GatewayConfig, TelemetrySettings};

    fn state_with(signaling: bool, telemetry: bool) -> AppState {
        let Ok(mut config) = GatewayConfig::from_lookup(|_| None) else {
            panic!("default config should load");
        };
        if signaling {
            config.signaling = Some(SignalingSettings {
                ws_url: "ws://janus.test:8188".to_string(),
                api_secret: None,
                keepalive_interval: Duration::from_secs(30),
            });
        }
        if telemetry {
            config.telemetry = Some(TelemetrySettings {
                ws_url: "ws://op25.test:8081".to_string(),
                secret_token: None,
                reconnect_delay: Duration::from_secs(2),
                subscriber_buffer: 8,
            });
        }
        let Ok(state) = AppState::new(config) else {
            panic!("state should build");
        };
        state
    }

    #[test]
    fn routing_message_selects_service() {
        assert_eq!(parse_routing_message(br#"{"service":"janus"}"#), Ok(Service::Janus));
        assert_eq!(
            parse_routing_message(br#"{"service":"op25","extra":true}"#),
            Ok(Service::Op25)
        );
    }

    #[test]
    fn malformed_routing_messages_are_violations() {
        let payloads: [&[u8]; 5] = [
            b"not json",
            br#"{"svc":"janus"}"#,
            br#"{"service":42}"#,
            br#"{"service":"sip"}"#,
            br#"["janus"]"#,
        ];
        for payload in payloads {
            assert!(
                matches!(parse_routing_message(payload), Err(RelayError::ProtocolViolation(_))),
                "payload {:?} should be rejected",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn unconfigured_services_are_unavailable() {
        let state = state_with(false, false);
        assert_eq!(
            resolve(Service::Janus, &state).err(),
            Some(RelayError::UpstreamUnavailable(Service::Janus))
        );
        assert_eq!(
            resolve(Service::Op25, &state).err(),
            Some(RelayError::UpstreamUnavailable(Service::Op25))
        );
    }

    #[test]
    fn configured_services_resolve() {
        let state = state_with(true, true);
        let Ok(Route::Signaling(settings)) = resolve(Service::Janus, &state) else {
            panic!("janus should resolve to the signaling proxy");
        };
        assert_eq!(settings.ws_url, "ws://janus.test:8188");
        assert!(matches!(resolve(Service::Op25, &state), Ok(Route::Telemetry(_))));
    }
}
