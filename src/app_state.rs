//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::broadcast::BroadcastRelay;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::service::{RestForwarder, TurnCredentialMinter};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
///
/// Each optional collaborator is present exactly when its backend is
/// configured.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// The process-wide OP25 relay.
    pub relay: Option<Arc<BroadcastRelay>>,
    /// OP25 REST passthrough.
    pub rest: Option<Arc<RestForwarder>>,
    /// TURN credential minting.
    pub turn: Option<Arc<TurnCredentialMinter>>,
}

impl AppState {
    /// Builds the state and its collaborators from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if an HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let relay = config
            .telemetry
            .clone()
            .map(|settings| Arc::new(BroadcastRelay::new(settings)));
        let rest = config
            .rest
            .clone()
            .map(RestForwarder::new)
            .transpose()?
            .map(Arc::new);
        let turn = config
            .turn
            .clone()
            .map(TurnCredentialMinter::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            config: Arc::new(config),
            relay,
            rest,
            turn,
        })
    }
}
