//! WebSocket entry point: upgrade handling and service routing.
//!
//! Upgrades are accepted under the configured WebSocket path prefix. Each
//! connection is owned by the router until its routing message arrives,
//! then by the Janus proxy or the OP25 relay until it closes.

pub mod handler;
pub mod router;
