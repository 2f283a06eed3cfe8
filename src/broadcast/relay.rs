//! Shared OP25 relay state and its mutation API.
//!
//! [`BroadcastRelay`] is constructed once at startup. All of its state, the
//! subscriber set and the upstream slot, sits behind one mutex so that
//! membership changes, fan-out and upstream swaps never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::upstream::run_upstream;
use crate::config::TelemetrySettings;
use crate::domain::{ClientNotification, ConnectionId, Frame};

/// The shared upstream connection, as seen by the relay.
#[derive(Debug)]
enum UpstreamSlot {
    /// No connection task has been started yet.
    Absent,
    /// The connection task is running but not connected.
    Reconnecting,
    /// Connected; frames sent here go to the backend.
    Open(mpsc::Sender<Frame>),
}

/// Why a subscriber frame did not reach the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ForwardError {
    /// No upstream connection is open.
    #[error("op25 upstream not open")]
    NotOpen,
    /// The upstream is open but its outbound queue is full.
    #[error("op25 upstream queue full")]
    QueueFull,
}

/// Subscriber set and upstream slot, mutated together.
#[derive(Debug)]
struct RelayState {
    subscribers: HashMap<ConnectionId, mpsc::Sender<Frame>>,
    upstream: UpstreamSlot,
    upstream_task: Option<JoinHandle<()>>,
}

impl RelayState {
    fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            upstream: UpstreamSlot::Absent,
            upstream_task: None,
        }
    }

    /// Adds a subscriber. Returns `true` if the upstream must be started.
    fn add_subscriber(&mut self, id: ConnectionId, tx: mpsc::Sender<Frame>) -> bool {
        self.subscribers.insert(id, tx);
        if matches!(self.upstream, UpstreamSlot::Absent) {
            self.upstream = UpstreamSlot::Reconnecting;
            true
        } else {
            false
        }
    }

    fn remove_subscriber(&mut self, id: ConnectionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Offers `frame` to every subscriber without waiting. Full queues
    /// lose this frame; closed queues are pruned. Returns the number of
    /// subscribers that accepted it.
    fn broadcast(&mut self, frame: &Frame) -> usize {
        let mut delivered = 0;
        self.subscribers
            .retain(|conn_id, tx| match tx.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(%conn_id, "subscriber queue full; dropping message");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        delivered
    }

    /// Queues a subscriber frame for the backend if the upstream is open.
    fn forward(&self, frame: Frame) -> Result<(), ForwardError> {
        match &self.upstream {
            UpstreamSlot::Open(tx) => tx.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => ForwardError::QueueFull,
                TrySendError::Closed(_) => ForwardError::NotOpen,
            }),
            UpstreamSlot::Absent | UpstreamSlot::Reconnecting => Err(ForwardError::NotOpen),
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.upstream, UpstreamSlot::Open(_))
    }
}

/// Fan-out relay over one shared OP25 upstream connection.
#[derive(Debug)]
pub struct BroadcastRelay {
    settings: TelemetrySettings,
    state: Mutex<RelayState>,
}

impl BroadcastRelay {
    /// Creates the relay. No upstream connection is made until the first
    /// subscriber arrives.
    #[must_use]
    pub fn new(settings: TelemetrySettings) -> Self {
        Self {
            settings,
            state: Mutex::new(RelayState::new()),
        }
    }

    /// Backend settings this relay connects with.
    #[must_use]
    pub const fn settings(&self) -> &TelemetrySettings {
        &self.settings
    }

    /// Adds a subscriber whose outbound queue is `tx`, starting the
    /// upstream connection task on first use.
    pub async fn subscribe(self: &Arc<Self>, conn_id: ConnectionId, tx: mpsc::Sender<Frame>) {
        let mut state = self.state.lock().await;
        if state.add_subscriber(conn_id, tx) {
            info!(url = %self.settings.ws_url, "starting op25 upstream");
            state.upstream_task = Some(tokio::spawn(run_upstream(Arc::clone(self))));
        }
        info!(%conn_id, subscribers = state.subscribers.len(), "op25 subscriber added");
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub async fn unsubscribe(&self, conn_id: ConnectionId) {
        let mut state = self.state.lock().await;
        if state.remove_subscriber(conn_id) {
            info!(%conn_id, subscribers = state.subscribers.len(), "op25 subscriber removed");
        }
    }

    /// Queues a subscriber's frame for the upstream without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError`] and drops the frame if the upstream is not
    /// open or its queue is full.
    pub async fn forward(&self, frame: Frame) -> Result<(), ForwardError> {
        self.state.lock().await.forward(frame)
    }

    /// Records the open upstream and announces it to all subscribers.
    pub async fn on_upstream_open(&self, tx: mpsc::Sender<Frame>) {
        let mut state = self.state.lock().await;
        state.upstream = UpstreamSlot::Open(tx);
        let notice = Frame::text(&ClientNotification::UpstreamConnected.to_json());
        let delivered = state.broadcast(&notice);
        info!(subscribers = delivered, "op25 upstream open");
    }

    /// Fans one upstream frame out to every open subscriber. Returns the
    /// number of copies delivered.
    pub async fn on_upstream_message(&self, frame: Frame) -> usize {
        let delivered = self.state.lock().await.broadcast(&frame);
        debug!(subscribers = delivered, bytes = frame.as_bytes().len(), "op25 message relayed");
        delivered
    }

    /// Clears the upstream reference and announces the loss. The upstream
    /// task schedules the reconnect.
    pub async fn on_upstream_closed(&self) {
        let mut state = self.state.lock().await;
        if matches!(state.upstream, UpstreamSlot::Open(_)) {
            state.upstream = UpstreamSlot::Reconnecting;
        }
        let notice = Frame::text(&ClientNotification::UpstreamDisconnected.to_json());
        let delivered = state.broadcast(&notice);
        info!(subscribers = delivered, "op25 upstream closed");
    }

    /// Number of current subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// Returns `true` while the upstream connection is open.
    pub async fn is_upstream_open(&self) -> bool {
        self.state.lock().await.is_open()
    }

    /// Stops the upstream connection task. Called on process shutdown.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(task) = state.upstream_task.take() {
            task.abort();
        }
        state.upstream = UpstreamSlot::Absent;
        info!("op25 relay stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn channel() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        mpsc::channel(8)
    }

    #[test]
    fn only_first_subscriber_starts_upstream() {
        let mut state = RelayState::new();
        let (a, _ra) = channel();
        let (b, _rb) = channel();
        assert!(state.add_subscriber(ConnectionId::new(), a));
        assert!(!state.add_subscriber(ConnectionId::new(), b));
    }

    #[test]
    fn broadcast_reaches_every_subscriber_once() {
        let mut state = RelayState::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = channel();
            state.add_subscriber(ConnectionId::new(), tx);
            receivers.push(rx);
        }
        let frame = Frame::text(r#"{"reading":42}"#);
        assert_eq!(state.broadcast(&frame), 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().ok(), Some(frame.clone()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn removed_subscriber_receives_nothing() {
        let mut state = RelayState::new();
        let (a, mut ra) = channel();
        let (b, mut rb) = channel();
        let gone = ConnectionId::new();
        state.add_subscriber(ConnectionId::new(), a);
        state.add_subscriber(gone, b);
        assert!(state.remove_subscriber(gone));
        assert!(!state.remove_subscriber(gone));

        assert_eq!(state.broadcast(&Frame::text("second")), 1);
        assert!(ra.try_recv().is_ok());
        assert!(rb.try_recv().is_err());
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let mut state = RelayState::new();
        let (a, ra) = channel();
        state.add_subscriber(ConnectionId::new(), a);
        drop(ra);
        assert_eq!(state.broadcast(&Frame::text("x")), 0);
        assert!(state.subscribers.is_empty());
    }

    #[test]
    fn full_subscriber_does_not_block_others() {
        let mut state = RelayState::new();
        let (slow, _slow_rx) = mpsc::channel(1);
        let (fast, mut fast_rx) = channel();
        state.add_subscriber(ConnectionId::new(), slow);
        state.add_subscriber(ConnectionId::new(), fast);

        assert_eq!(state.broadcast(&Frame::text("1")), 2);
        assert_eq!(state.broadcast(&Frame::text("2")), 1);
        assert_eq!(state.subscribers.len(), 2);
        assert_eq!(fast_rx.try_recv().ok(), Some(Frame::text("1")));
        assert_eq!(fast_rx.try_recv().ok(), Some(Frame::text("2")));
    }

    #[test]
    fn forward_requires_open_upstream() {
        let mut state = RelayState::new();
        assert_eq!(state.forward(Frame::text("cmd")), Err(ForwardError::NotOpen));

        let (up, mut up_rx) = channel();
        state.upstream = UpstreamSlot::Open(up);
        assert_eq!(state.forward(Frame::text("cmd")), Ok(()));
        assert_eq!(up_rx.try_recv().ok(), Some(Frame::text("cmd")));

        state.upstream = UpstreamSlot::Reconnecting;
        assert_eq!(state.forward(Frame::text("cmd")), Err(ForwardError::NotOpen));
    }

    #[test]
    fn full_upstream_queue_is_reported_apart_from_closed() {
        let mut state = RelayState::new();
        let (up, up_rx) = mpsc::channel(1);
        state.upstream = UpstreamSlot::Open(up);
        assert_eq!(state.forward(Frame::text("1")), Ok(()));
        assert_eq!(state.forward(Frame::text("2")), Err(ForwardError::QueueFull));

        drop(up_rx);
        assert_eq!(state.forward(Frame::text("3")), Err(ForwardError::NotOpen));
    }

    fn unreachable_settings() -> TelemetrySettings {
        TelemetrySettings {
            ws_url: "invalid://telemetry.test".to_string(),
            secret_token: None,
            reconnect_delay: Duration::from_secs(3600),
            subscriber_buffer: 8,
        }
    }

    #[tokio::test]
    async fn lifecycle_notifications_reach_subscribers() {
        let relay = Arc::new(BroadcastRelay::new(unreachable_settings()));
        let (tx, mut rx) = channel();
        relay.subscribe(ConnectionId::new(), tx).await;
        assert!(!relay.is_upstream_open().await);

        let (up, _up_rx) = channel();
        relay.on_upstream_open(up).await;
        assert!(relay.is_upstream_open().await);
        let Some(Frame::Text(connected)) = rx.recv().await else {
            panic!("expected connected notice");
        };
        assert_eq!(&*connected, r#"{"event":"upstream-connected"}"#);

        relay.on_upstream_closed().await;
        assert!(!relay.is_upstream_open().await);
        let Some(Frame::Text(disconnected)) = rx.recv().await else {
            panic!("expected disconnected notice");
        };
        assert_eq!(&*disconnected, r#"{"event":"upstream-disconnected"}"#);
        assert_eq!(relay.forward(Frame::text("cmd")).await, Err(ForwardError::NotOpen));

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn two_subscribers_then_one_leaves() {
        let relay = Arc::new(BroadcastRelay::new(unreachable_settings()));
        let (a, mut ra) = channel();
        let (b, mut rb) = channel();
        let leaving = ConnectionId::new();
        relay.subscribe(ConnectionId::new(), a).await;
        relay.subscribe(leaving, b).await;
        let (up, _up_rx) = channel();
        relay.on_upstream_open(up).await;
        let _ = ra.recv().await;
        let _ = rb.recv().await;

        let reading = Frame::text(r#"{"reading":42}"#);
        assert_eq!(relay.on_upstream_message(reading.clone()).await, 2);
        assert_eq!(ra.recv().await, Some(reading.clone()));
        assert_eq!(rb.recv().await, Some(reading));

        relay.unsubscribe(leaving).await;
        assert_eq!(relay.subscriber_count().await, 1);
        let next = Frame::text(r#"{"reading":43}"#);
        assert_eq!(relay.on_upstream_message(next.clone()).await, 1);
        assert_eq!(ra.recv().await, Some(next));
        assert!(rb.try_recv().is_err());

        relay.shutdown().await;
    }
}
