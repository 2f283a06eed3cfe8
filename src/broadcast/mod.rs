//! OP25 telemetry fan-out.
//!
//! One upstream connection is shared by every subscriber. Upstream
//! frames are copied to all subscribers, and subscriber frames are sent
//! upstream while the connection is open.

pub mod relay;
pub mod subscriber;
mod upstream;

pub use relay::{BroadcastRelay, ForwardError};
pub use subscriber::run_subscriber;
