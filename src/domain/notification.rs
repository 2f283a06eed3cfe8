//! Notifications the gateway itself sends to clients.
//!
//! Everything else a client receives is a backend message relayed verbatim.

use serde::Serialize;
use serde_json::Value;

/// Gateway-originated client notification, serialized with an `event` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientNotification {
    /// The Janus session and streaming plugin handle are ready.
    SessionEstablished {
        /// Backend-assigned session id.
        #[serde(rename = "sessionId")]
        session_id: Value,
        /// Backend-assigned plugin handle id.
        #[serde(rename = "handleId")]
        handle_id: Value,
    },
    /// Streams offered by the streaming plugin.
    StreamsAvailable {
        /// Stream descriptors as reported by the backend.
        streams: Value,
    },
    /// The shared OP25 upstream connection opened.
    UpstreamConnected,
    /// The shared OP25 upstream connection was lost.
    UpstreamDisconnected,
}

impl ClientNotification {
    /// Serializes the notification to its JSON text form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
