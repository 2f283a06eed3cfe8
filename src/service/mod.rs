//! Service layer: HTTP collaborators behind the REST routes.
//!
//! [`RestForwarder`] passes OP25 control calls through to the OP25 API and
//! [`TurnCredentialMinter`] fetches short-lived TURN credentials. Both make
//! exactly one outbound request per call.

pub mod rest_forward;
pub mod turn_credentials;

pub use rest_forward::{ForwardedResponse, Op25Endpoint, RestForwarder};
pub use turn_credentials::{TurnCredentialMinter, TurnCredentials};
