//! Transaction correlation for requests sent to an upstream backend.
//!
//! Every request the gateway sends upstream carries a locally generated
//! [`TransactionId`]. The [`TransactionTagger`] records what each id was
//! issued for and resolves responses back to that [`TransactionPurpose`].
//! Ids are a per-tagger random prefix plus a monotonically increasing
//! counter, so they never collide within a session and are unlikely to
//! collide across sessions sharing one backend.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Correlation id placed in the `transaction` field of upstream requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TransactionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a pending transaction was issued for.
///
/// The handshake purposes drive the signaling state machine. The remaining
/// purposes are relayed verbatim once their response arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPurpose {
    /// `create` request opening a backend session.
    CreateSession,
    /// `attach` request binding the streaming plugin.
    AttachPlugin,
    /// `list` request enumerating available streams.
    ListStreams,
    /// Client `watch` request.
    Watch,
    /// Periodic session keepalive.
    Keepalive,
    /// Client `start` request carrying the SDP answer.
    Start,
    /// Client ICE candidate.
    Trickle,
    /// Session teardown.
    Destroy,
}

impl TransactionPurpose {
    /// Returns `true` if an `ack` is the final response for this purpose.
    ///
    /// Plugin requests are acknowledged first and answered later with the
    /// same transaction, so their entry must survive the `ack`.
    #[must_use]
    pub const fn completes_on_ack(self) -> bool {
        matches!(self, Self::Keepalive | Self::Trickle)
    }

    /// Returns `true` for purposes whose responses go to the client as-is.
    #[must_use]
    pub const fn is_relayed(self) -> bool {
        !matches!(
            self,
            Self::CreateSession | Self::AttachPlugin | Self::ListStreams
        )
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateSession => "create-session",
            Self::AttachPlugin => "attach-plugin",
            Self::ListStreams => "list-streams",
            Self::Watch => "watch",
            Self::Keepalive => "keepalive",
            Self::Start => "start",
            Self::Trickle => "trickle",
            Self::Destroy => "destroy",
        }
    }
}

/// Issues transaction ids and tracks the pending ones.
#[derive(Debug)]
pub struct TransactionTagger {
    prefix: String,
    next: u64,
    pending: HashMap<TransactionId, TransactionPurpose>,
}

impl TransactionTagger {
    /// Creates a tagger with a fresh random prefix.
    #[must_use]
    pub fn new() -> Self {
        let prefix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect();
        Self {
            prefix,
            next: 0,
            pending: HashMap::new(),
        }
    }

    /// Generates a new id and records it as pending for `purpose`.
    pub fn tag(&mut self, purpose: TransactionPurpose) -> TransactionId {
        self.next = self.next.wrapping_add(1);
        let id = TransactionId(format!("txn-{}-{}", self.prefix, self.next));
        self.pending.insert(id.clone(), purpose);
        id
    }

    /// Resolves a response's transaction to its purpose.
    ///
    /// Final responses consume the entry. Interim responses (`ack`) consume
    /// it only when the purpose completes on ack. Returns `None` for ids that
    /// were never issued or are already consumed.
    pub fn resolve(&mut self, transaction: &str, interim: bool) -> Option<TransactionPurpose> {
        let purpose = *self.pending.get(transaction)?;
        if !interim || purpose.completes_on_ack() {
            self.pending.remove(transaction);
        }
        Some(purpose)
    }

    /// Number of transactions awaiting a final response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for TransactionTagger {
    fn default() -> Self {
        Self::new()
    }
}
