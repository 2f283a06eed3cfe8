//! Per-client Janus session state machine.
//!
//! [`SignalingSession`] owns the session/handle identity and the pending
//! transaction table of one client. It performs no I/O: each input returns
//! the actions the proxy must carry out, in order.
//!
//! ```text
//! Connecting ──open──► SessionPending ──create ok──► HandlePending
//!     ──attach ok──► ListPending ──list ok──► Active
//! any state ──client/upstream gone or handshake error──► Terminated
//! ```

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::protocol::{ClientCommand, ClientRequestBody, JanusRequest, UpstreamMessage};
use crate::domain::{ClientNotification, ConnectionId, TransactionPurpose, TransactionTagger};
use crate::error::RelayError;

/// Lifecycle state of a signaling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upstream connection not yet open.
    Connecting,
    /// Waiting for the `create` response.
    SessionPending,
    /// Waiting for the `attach` response.
    HandlePending,
    /// Waiting for the stream list.
    ListPending,
    /// Steady-state relay.
    Active,
    /// Torn down; no further requests are produced.
    Terminated,
}

/// Side effect requested by the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send a request to the backend.
    SendUpstream(JanusRequest),
    /// Send a gateway notification to the client.
    Notify(ClientNotification),
    /// Send a backend message to the client unmodified.
    Relay(String),
    /// Start the keepalive schedule.
    ArmKeepalive,
    /// End the session.
    Terminate(RelayError),
}

/// State of one client's Janus session.
#[derive(Debug)]
pub struct SignalingSession {
    conn_id: ConnectionId,
    state: SessionState,
    session_id: Option<Value>,
    handle_id: Option<Value>,
    watch_outstanding: bool,
    transactions: TransactionTagger,
    api_secret: Option<String>,
}

impl SignalingSession {
    /// Creates a session in [`SessionState::Connecting`].
    #[must_use]
    pub fn new(conn_id: ConnectionId, api_secret: Option<String>) -> Self {
        Self {
            conn_id,
            state: SessionState::Connecting,
            session_id: None,
            handle_id: None,
            watch_outstanding: false,
            transactions: TransactionTagger::new(),
            api_secret,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Backend session id, once known.
    #[must_use]
    pub const fn session_id(&self) -> Option<&Value> {
        self.session_id.as_ref()
    }

    /// Plugin handle id, once known.
    #[must_use]
    pub const fn handle_id(&self) -> Option<&Value> {
        self.handle_id.as_ref()
    }

    /// Returns `true` while a forwarded `watch` awaits its outcome.
    #[must_use]
    pub const fn is_watch_outstanding(&self) -> bool {
        self.watch_outstanding
    }

    /// Upstream opened: returns the `create` request.
    pub fn on_upstream_open(&mut self) -> JanusRequest {
        self.state = SessionState::SessionPending;
        let txn = self.transactions.tag(TransactionPurpose::CreateSession);
        self.secured(JanusRequest::create(txn))
    }

    /// Handles one text message from the backend.
    pub fn on_upstream_message(&mut self, text: &str) -> Vec<SessionAction> {
        if self.state == SessionState::Terminated {
            return Vec::new();
        }
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(conn_id = %self.conn_id, error = %e, "dropping malformed upstream message");
                return Vec::new();
            }
        };
        let message = UpstreamMessage::decode(&value);

        let purpose = match message.transaction() {
            Some(txn) => match self.transactions.resolve(txn, message.is_interim()) {
                Some(purpose) => Some(purpose),
                None => {
                    let err = RelayError::TransactionMismatch(txn.to_string());
                    warn!(conn_id = %self.conn_id, error = %err, "dropping upstream message");
                    return Vec::new();
                }
            },
            None => None,
        };

        match (purpose, message) {
            (Some(TransactionPurpose::CreateSession), UpstreamMessage::Success { data, .. })
                if self.state == SessionState::SessionPending =>
            {
                let Some(session_id) = data.and_then(|d| d.id) else {
                    return self.handshake_failed("create response without session id");
                };
                info!(conn_id = %self.conn_id, %session_id, "janus session created");
                self.session_id = Some(session_id.clone());
                self.state = SessionState::HandlePending;
                let txn = self.transactions.tag(TransactionPurpose::AttachPlugin);
                vec![
                    SessionAction::ArmKeepalive,
                    SessionAction::SendUpstream(self.secured(JanusRequest::attach(txn, session_id))),
                ]
            }
            (Some(TransactionPurpose::AttachPlugin), UpstreamMessage::Success { data, .. })
                if self.state == SessionState::HandlePending =>
            {
                let (Some(handle_id), Some(session_id)) =
                    (data.and_then(|d| d.id), self.session_id.clone())
                else {
                    return self.handshake_failed("attach response without handle id");
                };
                info!(conn_id = %self.conn_id, %handle_id, "streaming plugin attached");
                self.handle_id = Some(handle_id.clone());
                self.state = SessionState::ListPending;
                let txn = self.transactions.tag(TransactionPurpose::ListStreams);
                let list = JanusRequest::message(
                    txn,
                    session_id.clone(),
                    handle_id.clone(),
                    json!({ "request": "list" }),
                );
                vec![
                    SessionAction::Notify(ClientNotification::SessionEstablished {
                        session_id,
                        handle_id,
                    }),
                    SessionAction::SendUpstream(self.secured(list)),
                ]
            }
            (Some(TransactionPurpose::ListStreams), UpstreamMessage::Success { plugindata, .. })
                if self.state == SessionState::ListPending =>
            {
                let streams = plugindata.unwrap_or_default().stream_list();
                debug!(conn_id = %self.conn_id, streams = %streams, "stream list received");
                self.state = SessionState::Active;
                vec![SessionAction::Notify(ClientNotification::StreamsAvailable {
                    streams,
                })]
            }
            (Some(purpose), UpstreamMessage::Error { error, .. }) if !purpose.is_relayed() => {
                let reason = error.map_or_else(String::new, |e| format!("{} {}", e.code, e.reason));
                self.handshake_failed(&format!("{} rejected: {reason}", purpose.as_str()))
            }
            (purpose, message) => {
                if purpose == Some(TransactionPurpose::Watch) && message.is_failure() {
                    debug!(conn_id = %self.conn_id, "watch failed; accepting a new watch");
                    self.watch_outstanding = false;
                }
                if matches!(message, UpstreamMessage::Hangup | UpstreamMessage::Detached) {
                    self.watch_outstanding = false;
                }
                if self.state == SessionState::Active {
                    vec![SessionAction::Relay(text.to_string())]
                } else {
                    debug!(conn_id = %self.conn_id, state = ?self.state, "dropping upstream message before session is active");
                    Vec::new()
                }
            }
        }
    }

    /// Handles one text message from the client, returning the rewritten
    /// request to forward, if any.
    pub fn on_client_message(&mut self, text: &str) -> Option<JanusRequest> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                let err = RelayError::ProtocolViolation(e.to_string());
                warn!(conn_id = %self.conn_id, error = %err, "dropping malformed client message");
                return None;
            }
        };
        if self.state != SessionState::Active {
            debug!(conn_id = %self.conn_id, state = ?self.state, "ignoring client command before session is active");
            return None;
        }
        let (Some(session_id), Some(handle_id)) = (self.session_id.clone(), self.handle_id.clone())
        else {
            return None;
        };

        let request = match ClientCommand::decode(&value) {
            ClientCommand::Message {
                body: ClientRequestBody::Watch { id },
                ..
            } => {
                if self.watch_outstanding {
                    debug!(conn_id = %self.conn_id, "watch already outstanding; ignoring duplicate");
                    return None;
                }
                self.watch_outstanding = true;
                let txn = self.transactions.tag(TransactionPurpose::Watch);
                JanusRequest::message(
                    txn,
                    session_id,
                    handle_id,
                    json!({ "request": "watch", "id": id, "audio": true, "video": false }),
                )
            }
            ClientCommand::Message {
                body: ClientRequestBody::Start,
                jsep,
            } => {
                let txn = self.transactions.tag(TransactionPurpose::Start);
                JanusRequest::message(txn, session_id, handle_id, json!({ "request": "start" }))
                    .with_jsep(jsep)
            }
            ClientCommand::Trickle {
                candidate: Some(candidate),
            } => {
                let txn = self.transactions.tag(TransactionPurpose::Trickle);
                JanusRequest::trickle(txn, session_id, handle_id, candidate)
            }
            ClientCommand::Trickle { candidate: None } => {
                let err = RelayError::ProtocolViolation("trickle without candidate".to_string());
                warn!(conn_id = %self.conn_id, error = %err, "dropping client message");
                return None;
            }
            ClientCommand::Message {
                body: ClientRequestBody::Unrecognized,
                ..
            }
            | ClientCommand::Unrecognized => {
                debug!(conn_id = %self.conn_id, "ignoring unsupported client command");
                return None;
            }
        };
        Some(self.secured(request))
    }

    /// Keepalive tick: returns the keepalive request while a session exists.
    pub fn keepalive_request(&mut self) -> Option<JanusRequest> {
        if self.state == SessionState::Terminated {
            return None;
        }
        let session_id = self.session_id.clone()?;
        let txn = self.transactions.tag(TransactionPurpose::Keepalive);
        Some(self.secured(JanusRequest::keepalive(txn, session_id)))
    }

    /// Enters [`SessionState::Terminated`], returning the `destroy` request
    /// to send if the upstream is still open. Idempotent.
    pub fn terminate(&mut self) -> Option<JanusRequest> {
        if self.state == SessionState::Terminated {
            return None;
        }
        self.state = SessionState::Terminated;
        let session_id = self.session_id.clone()?;
        let txn = self.transactions.tag(TransactionPurpose::Destroy);
        Some(self.secured(JanusRequest::destroy(txn, session_id)))
    }

    fn handshake_failed(&self, reason: &str) -> Vec<SessionAction> {
        vec![SessionAction::Terminate(RelayError::UpstreamFailure(
            reason.to_string(),
        ))]
    }

    fn secured(&self, request: JanusRequest) -> JanusRequest {
        request.with_secret(self.api_secret.as_deref())
    }
}
