//! Domain layer: identities, transaction correlation, and wire payloads.
//!
//! This module contains the types shared by the service router and both
//! relays: connection identity, the service selector, transaction tagging
//! for upstream requests, gateway notifications, and opaque data frames.

pub mod connection_id;
pub mod frame;
pub mod notification;
pub mod service;
pub mod transaction;

pub use connection_id::ConnectionId;
pub use frame::Frame;
pub use notification::ClientNotification;
pub use service::Service;
pub use transaction::{TransactionId, TransactionPurpose, TransactionTagger};
