//! # op25-gateway
//!
//! WebSocket relay and REST gateway in front of a Janus streaming server and
//! an OP25 radio-monitoring backend.
//!
//! Browsers open one WebSocket to the gateway and name the backend they want
//! in their first message. Janus clients get a dedicated signaling session
//! whose handshake, keepalive and teardown the gateway drives; OP25 clients
//! share a single upstream telemetry connection fanned out to every
//! subscriber. A small REST surface forwards OP25 control calls and mints
//! TURN credentials.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── Service Router (ws/)
//!     │     ├── Janus Signaling Proxy (signaling/) ── one upstream per client
//!     │     └── OP25 Broadcast Relay (broadcast/) ── one shared upstream
//!     │
//!     ├── REST Handlers (api/)
//!     │     ├── RestForwarder (service/)
//!     │     └── TurnCredentialMinter (service/)
//!     │
//!     └── Static assets
//! ```

pub mod api;
pub mod app_state;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod signaling;
pub mod ws;
