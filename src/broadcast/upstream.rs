//! The single OP25 upstream connection and its reconnect loop.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::relay::BroadcastRelay;
use crate::config::TelemetrySettings;
use crate::domain::Frame;
use crate::error::RelayError;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Keeps the shared upstream connected for the life of the process.
///
/// Every closure, error or failed connect is followed by the fixed
/// reconnect delay and a new attempt. There is no retry limit.
pub(crate) async fn run_upstream(relay: Arc<BroadcastRelay>) {
    let settings = relay.settings().clone();
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match connect(&settings).await {
            Ok(socket) => {
                info!(url = %settings.ws_url, attempt, "op25 upstream connected");
                attempt = 0;
                let (tx, rx) = mpsc::channel(settings.subscriber_buffer);
                relay.on_upstream_open(tx).await;
                let reason = pump(socket, rx, &relay).await;
                warn!(error = %reason, "op25 upstream lost");
                relay.on_upstream_closed().await;
            }
            Err(err) => warn!(url = %settings.ws_url, attempt, error = %err, "op25 upstream connect failed"),
        }
        debug!(delay_ms = settings.reconnect_delay.as_millis(), "scheduling op25 reconnect");
        tokio::time::sleep(settings.reconnect_delay).await;
    }
}

async fn connect(settings: &TelemetrySettings) -> Result<UpstreamSocket, RelayError> {
    let mut request = settings
        .ws_url
        .as_str()
        .into_client_request()
        .map_err(|e| RelayError::UpstreamFailure(e.to_string()))?;
    if let Some(token) = &settings.secret_token {
        let value = HeaderValue::from_str(token)
            .map_err(|e| RelayError::UpstreamFailure(format!("invalid authorization token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (socket, _response) = connect_async(request)
        .await
        .map_err(|e| RelayError::UpstreamFailure(e.to_string()))?;
    Ok(socket)
}

/// Moves frames in both directions until the connection ends. Returns
/// why it ended.
async fn pump(
    socket: UpstreamSocket,
    mut outbound: mpsc::Receiver<Frame>,
    relay: &BroadcastRelay,
) -> RelayError {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(UpstreamMessage::Close(_))) | None => {
                    return RelayError::UpstreamFailure("connection closed".to_string());
                }
                Some(Ok(message)) => {
                    if let Some(frame) = Frame::from_upstream(&message) {
                        relay.on_upstream_message(frame).await;
                    }
                }
                Some(Err(e)) => {
                    let _ = sink.close().await;
                    return RelayError::UpstreamFailure(e.to_string());
                }
            },
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    return RelayError::UpstreamFailure("relay released the connection".to_string());
                };
                if let Err(e) = sink.send(frame.to_upstream()).await {
                    return RelayError::UpstreamFailure(e.to_string());
                }
            }
        }
    }
}
