//! Shared harness: a gateway on an ephemeral port and fake backends.

#![allow(dead_code, clippy::panic)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async, connect_async};

use op25_gateway::app_state::AppState;
use op25_gateway::config::GatewayConfig;
use op25_gateway::server::build_app;

/// Client socket connected to the gateway.
pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Builds a config from `pairs`, with every other variable unset.
pub fn config(pairs: &[(&str, String)]) -> GatewayConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    let Ok(config) = GatewayConfig::from_lookup(|key| vars.get(key).cloned()) else {
        panic!("test config should load");
    };
    config
}

/// Builds application state from `config`.
pub fn state(config: GatewayConfig) -> AppState {
    let Ok(state) = AppState::new(config) else {
        panic!("test state should build");
    };
    state
}

/// Serves the gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, AppState) {
    let state = state(config);
    let app = build_app(state.clone());
    let addr = serve(app).await;
    (addr, state)
}

/// Serves any axum router on an ephemeral port.
pub async fn serve(app: axum::Router) -> SocketAddr {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Opens a client connection to the relay endpoint.
pub async fn connect_client(gateway: SocketAddr) -> Client {
    let Ok((client, _)) = connect_async(format!("ws://{gateway}/ws")).await else {
        panic!("client should connect to the gateway");
    };
    client
}

/// Sends a text frame.
pub async fn send_text(client: &mut Client, text: &str) {
    let Ok(()) = client.send(Message::Text(text.to_string().into())).await else {
        panic!("client send failed");
    };
}

/// Next data frame as JSON.
pub async fn next_json(client: &mut Client) -> Value {
    loop {
        let Ok(Some(Ok(message))) = tokio::time::timeout(WAIT, client.next()).await else {
            panic!("expected a message from the gateway");
        };
        match message {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str(text.as_str()) else {
                    panic!("gateway sent non-JSON text: {text}");
                };
                return value;
            }
            Message::Binary(data) => {
                let Ok(value) = serde_json::from_slice(&data) else {
                    panic!("gateway sent non-JSON binary");
                };
                return value;
            }
            Message::Close(_) => panic!("gateway closed the connection"),
            _ => {}
        }
    }
}

/// Asserts the gateway closes the connection without sending data.
pub async fn expect_closed(client: &mut Client) {
    loop {
        match tokio::time::timeout(WAIT, client.next()).await {
            Ok(Some(Ok(Message::Close(_))) | None | Some(Err(_))) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected payload before close: {text}"),
            Ok(Some(Ok(_))) => {}
            Err(_) => panic!("connection was not closed"),
        }
    }
}

/// A fake Janus server accepting one connection.
///
/// The first item on the returned channel is `{"connected": true}` once the
/// gateway connects; every request received follows in order.
pub async fn spawn_fake_janus() -> (SocketAddr, mpsc::UnboundedReceiver<Value>) {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let echo_protocol = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            if let Some(protocol) = req.headers().get(SEC_WEBSOCKET_PROTOCOL) {
                resp.headers_mut()
                    .insert(SEC_WEBSOCKET_PROTOCOL, protocol.clone());
            }
            Ok(resp)
        };
        let Ok(mut ws) = accept_hdr_async(stream, echo_protocol).await else {
            return;
        };
        let _ = seen_tx.send(json!({ "connected": true }));
        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
                continue;
            };
            let replies = janus_replies(&request);
            let _ = seen_tx.send(request);
            for reply in replies {
                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                    return;
                }
            }
        }
    });
    (addr, seen_rx)
}

fn janus_replies(request: &Value) -> Vec<Value> {
    let txn = request.get("transaction").cloned().unwrap_or(Value::Null);
    let kind = request.get("janus").and_then(Value::as_str).unwrap_or_default();
    let body_request = request
        .get("body")
        .and_then(|b| b.get("request"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let ack = json!({ "janus": "ack", "session_id": "123", "transaction": txn });
    match (kind, body_request) {
        ("create", _) => vec![json!({ "janus": "success", "transaction": txn, "data": { "id": "123" } })],
        ("attach", _) => vec![json!({
            "janus": "success",
            "session_id": "123",
            "transaction": txn,
            "data": { "id": "456" }
        })],
        ("message", "list") => vec![json!({
            "janus": "success",
            "session_id": "123",
            "sender": "456",
            "transaction": txn,
            "plugindata": {
                "plugin": "janus.plugin.streaming",
                "data": { "streaming": "list", "list": [{ "id": 1 }] }
            }
        })],
        ("message", "watch") => vec![
            ack,
            json!({
                "janus": "event",
                "session_id": "123",
                "sender": "456",
                "transaction": txn,
                "plugindata": {
                    "plugin": "janus.plugin.streaming",
                    "data": { "streaming": "event", "result": { "status": "preparing" } }
                },
                "jsep": { "type": "offer", "sdp": "v=0" }
            }),
        ],
        ("destroy", _) => vec![json!({ "janus": "success", "session_id": "123", "transaction": txn })],
        _ => vec![ack],
    }
}

/// One accepted connection on the fake OP25 server.
#[derive(Debug)]
pub struct FakeOp25Conn {
    /// Frames to send to the gateway. Dropping it closes the connection.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames received from the gateway.
    pub inbound: mpsc::UnboundedReceiver<String>,
    /// `Authorization` header presented by the gateway.
    pub authorization: Option<String>,
}

/// A fake OP25 telemetry server accepting any number of connections.
pub async fn spawn_fake_op25() -> (SocketAddr, mpsc::UnboundedReceiver<FakeOp25Conn>) {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let mut authorization = None;
            let capture = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                authorization = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                Ok(resp)
            };
            let Ok(ws) = accept_hdr_async(stream, capture).await else {
                continue;
            };
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            tokio::spawn(run_fake_op25_conn(ws, out_rx, in_tx));
            let conn = FakeOp25Conn {
                outbound: out_tx,
                inbound: in_rx,
                authorization,
            };
            if conn_tx.send(conn).is_err() {
                return;
            }
        }
    });
    (addr, conn_rx)
}

async fn run_fake_op25_conn(
    mut ws: WebSocketStream<TcpStream>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<String>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = ws.close(None).await;
                    return;
                }
            },
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound.send(text.to_string());
                }
                Some(Ok(_)) => {}
                _ => return,
            }
        }
    }
}

/// Waits for the next item on a fake backend channel.
pub async fn next_item<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    let Ok(Some(item)) = tokio::time::timeout(WAIT, rx.recv()).await else {
        panic!("fake backend saw nothing");
    };
    item
}
