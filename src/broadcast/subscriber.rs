//! Per-client task for clients routed to the OP25 relay.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::relay::BroadcastRelay;
use crate::domain::{ConnectionId, Frame};

/// Serves one subscriber until its socket closes.
///
/// Upstream frames arrive through a bounded queue owned by the relay;
/// client frames are forwarded upstream when it is open and dropped
/// otherwise.
pub async fn run_subscriber(socket: WebSocket, relay: Arc<BroadcastRelay>, conn_id: ConnectionId) {
    let (tx, mut rx) = mpsc::channel::<Frame>(relay.settings().subscriber_buffer);
    relay.subscribe(conn_id, tx).await;

    let (mut client_tx, mut client_rx) = socket.split();
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if client_tx.send(frame.to_client()).await.is_err() {
                    break;
                }
            }
            msg = client_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(message)) => {
                    if let Some(frame) = Frame::from_client(&message)
                        && let Err(reason) = relay.forward(frame).await
                    {
                        debug!(%conn_id, %reason, "dropping client message");
                    }
                }
            }
        }
    }

    relay.unsubscribe(conn_id).await;
    let _ = client_tx.close().await;
    info!(%conn_id, "op25 subscriber disconnected");
}
