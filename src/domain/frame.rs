//! Opaque data frames moved between client and upstream sockets.
//!
//! The client side speaks axum's WebSocket types and the upstream side
//! speaks tungstenite's. [`Frame`] carries the payload between them without
//! re-serializing it, and clones cheaply for fan-out.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::Message as ClientMessage;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

/// A text or binary payload. Control frames are not represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(Arc<str>),
    /// Binary payload.
    Binary(Bytes),
}

impl Frame {
    /// Builds a text frame.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Text(Arc::from(text))
    }

    /// Extracts the data frame from a client message.
    #[must_use]
    pub fn from_client(message: &ClientMessage) -> Option<Self> {
        match message {
            ClientMessage::Text(text) => Some(Self::text(text.as_str())),
            ClientMessage::Binary(data) => Some(Self::Binary(data.clone())),
            _ => None,
        }
    }

    /// Extracts the data frame from an upstream message.
    #[must_use]
    pub fn from_upstream(message: &UpstreamMessage) -> Option<Self> {
        match message {
            UpstreamMessage::Text(text) => Some(Self::text(text.as_str())),
            UpstreamMessage::Binary(data) => Some(Self::Binary(data.clone())),
            _ => None,
        }
    }

    /// Converts into a message for a client socket.
    #[must_use]
    pub fn to_client(&self) -> ClientMessage {
        match self {
            Self::Text(text) => ClientMessage::Text(text.to_string().into()),
            Self::Binary(data) => ClientMessage::Binary(data.clone()),
        }
    }

    /// Converts into a message for an upstream socket.
    #[must_use]
    pub fn to_upstream(&self) -> UpstreamMessage {
        match self {
            Self::Text(text) => UpstreamMessage::Text(text.to_string().into()),
            Self::Binary(data) => UpstreamMessage::Binary(data.clone()),
        }
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data.as_ref(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn control_frames_are_ignored() {
        assert_eq!(Frame::from_client(&ClientMessage::Close(None)), None);
        assert_eq!(Frame::from_upstream(&UpstreamMessage::Close(None)), None);
    }

    #[test]
    fn text_crosses_sides_unchanged() {
        let upstream = UpstreamMessage::Text(r#"{"reading": 42}"#.to_string().into());
        let Some(frame) = Frame::from_upstream(&upstream) else {
            panic!("text is a data frame");
        };
        let ClientMessage::Text(text) = frame.to_client() else {
            panic!("text frame converts to text message");
        };
        assert_eq!(text.as_str(), r#"{"reading": 42}"#);
    }

    #[test]
    fn binary_keeps_bytes() {
        let frame = Frame::Binary(Bytes::from_static(&[0, 159, 146, 150]));
        assert_eq!(frame.as_bytes(), &[0, 159, 146, 150]);
        assert_eq!(Frame::from_upstream(&frame.to_upstream()), Some(frame));
    }
}
