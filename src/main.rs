//! op25-gateway server entry point.
//!
//! Starts the Axum HTTP server with the relay endpoint, REST routes and
//! static assets.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use op25_gateway::app_state::AppState;
use op25_gateway::config::GatewayConfig;
use op25_gateway::server::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(
        addr = %config.listen_addr,
        janus = config.signaling.is_some(),
        op25 = config.telemetry.is_some(),
        op25_rest = config.rest.is_some(),
        turn = config.turn.is_some(),
        "starting op25-gateway"
    );

    let listen_addr = config.listen_addr;
    let state = AppState::new(config)?;
    let relay = state.relay.clone();
    let app = build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(relay) = relay {
        relay.shutdown().await;
    }
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
