//! Per-client Janus proxy task.
//!
//! Owns one client socket and one dedicated upstream connection to Janus,
//! feeds both directions through a [`SignalingSession`], and tears the
//! session down when either side goes away.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use super::keepalive::KeepaliveTimer;
use super::protocol::{JanusRequest, SUBPROTOCOL};
use super::session::{SessionAction, SignalingSession};
use crate::config::SignalingSettings;
use crate::domain::ConnectionId;
use crate::error::RelayError;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type UpstreamSink = SplitSink<UpstreamSocket, UpstreamMessage>;
type ClientSink = SplitSink<WebSocket, Message>;

/// Why the relay loop stopped.
#[derive(Debug)]
enum Ended {
    /// The client closed or errored.
    ClientGone,
    /// Janus rejected the session; the upstream is still open.
    Rejected(RelayError),
    /// The upstream connection closed or errored.
    UpstreamLost(RelayError),
}

/// Runs the Janus proxy for one routed client until either side closes.
pub async fn run_signaling_proxy(
    mut socket: WebSocket,
    settings: SignalingSettings,
    conn_id: ConnectionId,
) {
    let upstream = match connect_upstream(&settings.ws_url).await {
        Ok(upstream) => upstream,
        Err(err) => {
            error!(%conn_id, error = %err, "janus upstream unreachable");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    info!(%conn_id, "janus upstream connected");

    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = socket.split();
    let mut session = SignalingSession::new(conn_id, settings.api_secret.clone());
    let mut keepalive = KeepaliveTimer::new(settings.keepalive_interval);

    let create = session.on_upstream_open();
    let ended = if let Err(err) = send_upstream(&mut upstream_tx, &create).await {
        Ended::UpstreamLost(err)
    } else {
        loop {
            tokio::select! {
                frame = upstream_rx.next() => {
                    let actions = match frame {
                        Some(Ok(UpstreamMessage::Text(text))) => {
                            session.on_upstream_message(text.as_str())
                        }
                        Some(Ok(UpstreamMessage::Binary(data))) => match std::str::from_utf8(&data) {
                            Ok(text) => session.on_upstream_message(text),
                            Err(e) => {
                                let err = RelayError::ProtocolViolation(e.to_string());
                                warn!(%conn_id, error = %err, "dropping binary upstream message");
                                continue;
                            }
                        },
                        Some(Ok(UpstreamMessage::Close(_))) | None => {
                            break Ended::UpstreamLost(RelayError::UpstreamFailure(
                                "connection closed".to_string(),
                            ));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            break Ended::UpstreamLost(RelayError::UpstreamFailure(e.to_string()));
                        }
                    };
                    if let Err(ended) =
                        apply(actions, &mut client_tx, &mut upstream_tx, &mut keepalive).await
                    {
                        break ended;
                    }
                }
                msg = client_rx.next() => {
                    let request = match msg {
                        Some(Ok(Message::Text(text))) => session.on_client_message(text.as_str()),
                        Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                            Ok(text) => session.on_client_message(text),
                            Err(e) => {
                                let err = RelayError::ProtocolViolation(e.to_string());
                                warn!(%conn_id, error = %err, "dropping binary client message");
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break Ended::ClientGone,
                        Some(Ok(_)) => continue,
                    };
                    if let Some(request) = request {
                        debug!(%conn_id, kind = request.kind(), transaction = %request.transaction(), "forwarding client command");
                        if let Err(err) = send_upstream(&mut upstream_tx, &request).await {
                            break Ended::UpstreamLost(err);
                        }
                    }
                }
                () = keepalive.tick() => {
                    if let Some(request) = session.keepalive_request() {
                        debug!(%conn_id, transaction = %request.transaction(), "sending keepalive");
                        if let Err(err) = send_upstream(&mut upstream_tx, &request).await {
                            break Ended::UpstreamLost(err);
                        }
                    }
                }
            }
        }
    };

    keepalive.cancel();
    let destroy = session.terminate();

    match ended {
        Ended::ClientGone => {
            info!(%conn_id, "client disconnected; tearing down janus session");
            destroy_and_close(&mut upstream_tx, destroy, conn_id).await;
        }
        Ended::Rejected(err) => {
            error!(%conn_id, error = %err, "janus session rejected");
            destroy_and_close(&mut upstream_tx, destroy, conn_id).await;
            close_client(&mut client_tx).await;
        }
        Ended::UpstreamLost(err) => {
            error!(%conn_id, error = %err, "janus upstream lost; closing client");
            close_client(&mut client_tx).await;
        }
    }
}

/// Opens the upstream connection with the Janus sub-protocol.
async fn connect_upstream(url: &str) -> Result<UpstreamSocket, RelayError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| RelayError::UpstreamFailure(e.to_string()))?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
    let (socket, _response) = connect_async(request)
        .await
        .map_err(|e| RelayError::UpstreamFailure(e.to_string()))?;
    Ok(socket)
}

/// Carries out session actions in order.
async fn apply(
    actions: Vec<SessionAction>,
    client_tx: &mut ClientSink,
    upstream_tx: &mut UpstreamSink,
    keepalive: &mut KeepaliveTimer,
) -> Result<(), Ended> {
    for action in actions {
        match action {
            SessionAction::SendUpstream(request) => {
                send_upstream(upstream_tx, &request)
                    .await
                    .map_err(Ended::UpstreamLost)?;
            }
            SessionAction::Notify(notification) => {
                client_tx
                    .send(Message::Text(notification.to_json().into()))
                    .await
                    .map_err(|_| Ended::ClientGone)?;
            }
            SessionAction::Relay(text) => {
                client_tx
                    .send(Message::Text(text.into()))
                    .await
                    .map_err(|_| Ended::ClientGone)?;
            }
            SessionAction::ArmKeepalive => keepalive.arm(),
            SessionAction::Terminate(err) => return Err(Ended::Rejected(err)),
        }
    }
    Ok(())
}

async fn send_upstream(sink: &mut UpstreamSink, request: &JanusRequest) -> Result<(), RelayError> {
    let text = request
        .to_json()
        .map_err(|e| RelayError::ProtocolViolation(e.to_string()))?;
    sink.send(UpstreamMessage::Text(text.into()))
        .await
        .map_err(|e| RelayError::UpstreamFailure(e.to_string()))
}

/// Best-effort teardown; failures are logged and not retried.
async fn destroy_and_close(
    upstream_tx: &mut UpstreamSink,
    destroy: Option<JanusRequest>,
    conn_id: ConnectionId,
) {
    if let Some(request) = destroy {
        match send_upstream(upstream_tx, &request).await {
            Ok(()) => debug!(%conn_id, "sent destroy"),
            Err(err) => warn!(%conn_id, error = %err, "failed to send destroy"),
        }
    }
    let _ = upstream_tx.close().await;
}

async fn close_client(client_tx: &mut ClientSink) {
    let _ = client_tx.send(Message::Close(None)).await;
    let _ = client_tx.close().await;
}
