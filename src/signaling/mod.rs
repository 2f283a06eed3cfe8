//! Janus signaling proxy.
//!
//! Each client routed to the `janus` service gets its own upstream Janus
//! connection. The proxy creates a session, attaches the streaming plugin,
//! lists the available streams, and then relays traffic in both directions,
//! rewriting client commands with the session identity and fresh
//! transaction ids. SDP and ICE payloads pass through untouched.

pub mod keepalive;
pub mod protocol;
pub mod proxy;
pub mod session;

pub use keepalive::KeepaliveTimer;
pub use proxy::run_signaling_proxy;
pub use session::{SessionAction, SessionState, SignalingSession};
