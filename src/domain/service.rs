//! Backend services a client can select with its routing message.

use std::fmt;

use serde::Serialize;

/// A relayed backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Janus WebRTC signaling, one upstream session per client.
    Janus,
    /// OP25 telemetry, one upstream shared by all subscribers.
    Op25,
}

impl Service {
    /// Parses the `service` selector of a routing message.
    #[must_use]
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "janus" => Some(Self::Janus),
            "op25" => Some(Self::Op25),
            _ => None,
        }
    }

    /// Returns the selector string of this service.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Janus => "janus",
            Self::Op25 => "op25",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
