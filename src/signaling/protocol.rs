//! Janus message shapes.
//!
//! Outbound requests are built with [`JanusRequest`]. Inbound messages are
//! decoded into closed sets of kinds: [`UpstreamMessage`] for the backend
//! and [`ClientCommand`] for the browser. Anything outside those sets
//! decodes to an explicit unrecognized variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::TransactionId;

/// WebSocket sub-protocol required by the Janus server.
pub const SUBPROTOCOL: &str = "janus-protocol";

/// Plugin attached for every session.
pub const STREAMING_PLUGIN: &str = "janus.plugin.streaming";

/// A request sent to the Janus backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JanusRequest {
    janus: &'static str,
    transaction: TransactionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    handle_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plugin: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jsep: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidate: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apisecret: Option<String>,
}

impl JanusRequest {
    fn new(janus: &'static str, transaction: TransactionId) -> Self {
        Self {
            janus,
            transaction,
            session_id: None,
            handle_id: None,
            plugin: None,
            body: None,
            jsep: None,
            candidate: None,
            apisecret: None,
        }
    }

    /// `create`: opens a session.
    #[must_use]
    pub fn create(transaction: TransactionId) -> Self {
        Self::new("create", transaction)
    }

    /// `attach`: binds the streaming plugin to a session.
    #[must_use]
    pub fn attach(transaction: TransactionId, session_id: Value) -> Self {
        Self {
            session_id: Some(session_id),
            plugin: Some(STREAMING_PLUGIN),
            ..Self::new("attach", transaction)
        }
    }

    /// `keepalive`: keeps a session from timing out.
    #[must_use]
    pub fn keepalive(transaction: TransactionId, session_id: Value) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::new("keepalive", transaction)
        }
    }

    /// `destroy`: tears a session down.
    #[must_use]
    pub fn destroy(transaction: TransactionId, session_id: Value) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::new("destroy", transaction)
        }
    }

    /// Plugin `message` with the given body.
    #[must_use]
    pub fn message(
        transaction: TransactionId,
        session_id: Value,
        handle_id: Value,
        body: Value,
    ) -> Self {
        Self {
            session_id: Some(session_id),
            handle_id: Some(handle_id),
            body: Some(body),
            ..Self::new("message", transaction)
        }
    }

    /// `trickle`: forwards an ICE candidate.
    #[must_use]
    pub fn trickle(
        transaction: TransactionId,
        session_id: Value,
        handle_id: Value,
        candidate: Value,
    ) -> Self {
        Self {
            session_id: Some(session_id),
            handle_id: Some(handle_id),
            candidate: Some(candidate),
            ..Self::new("trickle", transaction)
        }
    }

    /// Attaches an SDP payload.
    #[must_use]
    pub fn with_jsep(mut self, jsep: Option<Value>) -> Self {
        self.jsep = jsep;
        self
    }

    /// Attaches the shared API secret, if any.
    #[must_use]
    pub fn with_secret(mut self, secret: Option<&str>) -> Self {
        self.apisecret = secret.map(str::to_string);
        self
    }

    /// The request kind (`create`, `message`, ...).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.janus
    }

    /// The transaction this request is tagged with.
    #[must_use]
    pub const fn transaction(&self) -> &TransactionId {
        &self.transaction
    }

    /// The plugin body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Serializes the request to JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; with `Value` fields this does not
    /// happen in practice.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// `data` object of a `success` response.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessData {
    /// Session or handle id. Absent on `success` replies that create
    /// nothing.
    #[serde(default)]
    pub id: Option<Value>,
}

/// `plugindata` object of plugin responses and events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginData {
    /// Plugin-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl PluginData {
    /// The `list` array of a streaming `list` response, empty if absent.
    #[must_use]
    pub fn stream_list(&self) -> Value {
        match self.data.get("list") {
            Some(list @ Value::Array(_)) => list.clone(),
            _ => Value::Array(Vec::new()),
        }
    }

    /// Returns `true` if the plugin reported an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.data.get("error").is_some() || self.data.get("error_code").is_some()
    }
}

/// `error` object of an `error` response.
#[derive(Debug, Clone, Deserialize)]
pub struct JanusErrorBody {
    /// Numeric Janus error code.
    #[serde(default)]
    pub code: i64,
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
}

/// Message received from the Janus backend, keyed on its `janus` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "janus", rename_all = "lowercase")]
pub enum UpstreamMessage {
    /// Synchronous success.
    Success {
        /// Correlation id.
        transaction: Option<String>,
        /// Session/handle creation payload.
        data: Option<SuccessData>,
        /// Synchronous plugin response.
        plugindata: Option<PluginData>,
    },
    /// Request failure.
    Error {
        /// Correlation id.
        transaction: Option<String>,
        /// Failure details.
        error: Option<JanusErrorBody>,
    },
    /// Interim acknowledgement of an asynchronous request.
    Ack {
        /// Correlation id.
        transaction: Option<String>,
    },
    /// Plugin event, possibly answering an earlier request.
    Event {
        /// Correlation id, absent for unsolicited events.
        transaction: Option<String>,
        /// Plugin payload.
        plugindata: Option<PluginData>,
    },
    /// The PeerConnection was closed.
    Hangup,
    /// The plugin handle was detached.
    Detached,
    /// Any other message kind.
    #[serde(other)]
    Unrecognized,
}

impl UpstreamMessage {
    /// Decodes a parsed JSON value. Values without a known `janus` kind
    /// decode to [`UpstreamMessage::Unrecognized`].
    #[must_use]
    pub fn decode(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or(Self::Unrecognized)
    }

    /// The correlation id, if the message carries one.
    #[must_use]
    pub fn transaction(&self) -> Option<&str> {
        match self {
            Self::Success { transaction, .. }
            | Self::Error { transaction, .. }
            | Self::Ack { transaction }
            | Self::Event { transaction, .. } => transaction.as_deref(),
            Self::Hangup | Self::Detached | Self::Unrecognized => None,
        }
    }

    /// Returns `true` for interim responses that may be followed by a
    /// final one with the same transaction.
    #[must_use]
    pub const fn is_interim(&self) -> bool {
        matches!(self, Self::Ack { .. })
    }

    /// Returns `true` if the message reports a failure, either from Janus
    /// itself or from the plugin.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Error { .. } => true,
            Self::Success { plugindata, .. } | Self::Event { plugindata, .. } => {
                plugindata.as_ref().is_some_and(PluginData::is_error)
            }
            _ => false,
        }
    }
}

/// Plugin request body sent by the browser.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum ClientRequestBody {
    /// Start watching a mountpoint.
    Watch {
        /// Mountpoint id.
        id: Value,
    },
    /// Complete negotiation with an SDP answer.
    Start,
    /// Any other plugin request.
    #[serde(other)]
    Unrecognized,
}

/// Command sent by the browser, keyed on its `janus` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "janus", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Plugin message.
    Message {
        /// Plugin request.
        body: ClientRequestBody,
        /// Optional SDP payload.
        jsep: Option<Value>,
    },
    /// ICE candidate.
    Trickle {
        /// Candidate payload, forwarded unchanged.
        candidate: Option<Value>,
    },
    /// Any other command.
    #[serde(other)]
    Unrecognized,
}

impl ClientCommand {
    /// Decodes a parsed JSON value. Unknown or malformed commands decode to
    /// [`ClientCommand::Unrecognized`].
    #[must_use]
    pub fn decode(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or(Self::Unrecognized)
    }
}
