//! Duplex WebSocket channel manager.
//!
//! A background tokio task owns the socket exclusively. Callers interact
//! through a [`ChannelHandle`]: outbound messages go over an mpsc channel,
//! the connection state is published through a watch channel, and parsed
//! inbound messages arrive on a receiver handed out at spawn time.
//!
//! Every closure of an established connection schedules exactly one
//! reconnect according to [`ReconnectConfig`]; the default policy retries
//! forever with a fixed 3 second delay.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, ReconnectConfig};
use crate::protocol::{InboundMessage, OutboundMessage};

/// Connection lifecycle state, published via watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Short status label for frontends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Cloneable handle to the background connection task.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    outbound_tx: mpsc::UnboundedSender<String>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ChannelHandle {
    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// A watch receiver for observing state changes.
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Queue a message for delivery on the open socket.
    ///
    /// Messages sent while not connected are dropped, matching the
    /// fire-and-forget contract of the wire protocol. Returns whether the
    /// message was accepted, so callers can surface drops if they want to.
    pub fn send(&self, msg: &OutboundMessage) -> bool {
        if !self.is_connected() {
            debug!("dropping outbound message while disconnected");
            return false;
        }
        match serde_json::to_string(msg) {
            Ok(json) => self.outbound_tx.send(json).is_ok(),
            Err(e) => {
                debug!("failed to serialize outbound message: {e}");
                false
            }
        }
    }
}

/// Spawns and owns the background WebSocket task.
pub struct ChannelManager;

impl ChannelManager {
    /// Start the connection task.
    ///
    /// Returns a handle for sending and state observation, and the receiver
    /// of parsed inbound messages. The task runs until `cancel` fires or
    /// the reconnect policy gives up.
    pub fn spawn(
        connection: ConnectionConfig,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<InboundMessage>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        tokio::spawn(async move {
            connection_loop(connection, reconnect, state_tx, outbound_rx, inbound_tx, cancel).await;
        });

        (
            ChannelHandle {
                outbound_tx,
                state_rx,
            },
            inbound_rx,
        )
    }
}

/// How a single connection attempt ended.
enum ConnectOutcome {
    /// Shutdown was requested.
    Cancelled,
    /// The connection failed or was closed by the peer.
    Lost(String),
}

/// Run the connect/reconnect loop until cancelled or out of attempts.
async fn connection_loop(
    connection: ConnectionConfig,
    reconnect: ReconnectConfig,
    state_tx: watch::Sender<ConnectionState>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    cancel: CancellationToken,
) {
    // Consecutive failures since the last established connection.
    let mut failures: u32 = 0;

    loop {
        state_tx.send_replace(ConnectionState::Connecting);

        let outcome = try_connect(
            &connection,
            &state_tx,
            &mut outbound_rx,
            &inbound_tx,
            &cancel,
            &mut failures,
        )
        .await;

        state_tx.send_replace(ConnectionState::Disconnected);

        match outcome {
            ConnectOutcome::Cancelled => break,
            ConnectOutcome::Lost(reason) => {
                warn!("connection lost (attempt {failures}): {reason}");

                if !reconnect.should_retry(failures) {
                    warn!("giving up after {failures} failed attempts");
                    break;
                }
                let delay = reconnect.delay_for(failures);
                failures += 1;
                debug!("reconnecting in {delay:?}");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    info!("connection task stopped");
}

/// Run a single connection to completion. Returns on cancellation, on
/// connect failure, or when the established socket closes for any reason.
async fn try_connect(
    connection: &ConnectionConfig,
    state_tx: &watch::Sender<ConnectionState>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    inbound_tx: &mpsc::UnboundedSender<InboundMessage>,
    cancel: &CancellationToken,
    failures: &mut u32,
) -> ConnectOutcome {
    let url = &connection.server_url;

    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => return ConnectOutcome::Cancelled,
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(e) => return ConnectOutcome::Lost(format!("connect {url}: {e}")),
        },
    };

    let (mut write, mut read) = ws_stream.split();

    state_tx.send_replace(ConnectionState::Connected);
    *failures = 0;
    info!("connected to {url}");

    let ping_enabled = connection.ping_interval_secs > 0;
    let mut ping_interval =
        tokio::time::interval(Duration::from_secs(connection.ping_interval_secs.max(1)));
    // Skip the first immediate tick.
    ping_interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return ConnectOutcome::Cancelled;
            }
            // Inbound from server.
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_frame(&text, inbound_tx);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return ConnectOutcome::Lost("connection closed by server".into());
                    }
                    Some(Err(e)) => {
                        return ConnectOutcome::Lost(format!("read error: {e}"));
                    }
                    _ => {} // Binary, Ping/Pong frames handled by tungstenite.
                }
            }
            // Outbound from the handle.
            Some(json) = outbound_rx.recv() => {
                if let Err(e) = write.send(Message::Text(json)).await {
                    return ConnectOutcome::Lost(format!("send error: {e}"));
                }
            }
            // Periodic application-level heartbeat.
            _ = ping_interval.tick(), if ping_enabled => {
                if let Ok(json) = serde_json::to_string(&OutboundMessage::ping())
                    && let Err(e) = write.send(Message::Text(json)).await
                {
                    return ConnectOutcome::Lost(format!("ping error: {e}"));
                }
            }
        }
    }
}

/// Parse one inbound text frame and forward it. Malformed frames are
/// logged and ignored; they never tear down the connection.
fn handle_text_frame(text: &str, inbound_tx: &mpsc::UnboundedSender<InboundMessage>) {
    let msg: InboundMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("ignoring unparseable server message: {e}");
            return;
        }
    };
    // Receiver gone means shutdown is in progress.
    let _ = inbound_tx.send(msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle(state: ConnectionState) -> (ChannelHandle, mpsc::UnboundedReceiver<String>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (_state_tx, state_rx) = watch::channel(state);
        (
            ChannelHandle {
                outbound_tx,
                state_rx,
            },
            outbound_rx,
        )
    }

    #[test]
    fn send_drops_while_disconnected() {
        let (handle, mut rx) = test_handle(ConnectionState::Disconnected);
        assert!(!handle.send(&OutboundMessage::text("hello")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_queues_while_connected() {
        let (handle, mut rx) = test_handle(ConnectionState::Connected);
        assert!(handle.send(&OutboundMessage::text("hello")));
        let json = rx.try_recv().unwrap();
        assert!(json.contains("\"type\":\"text_message\""));
    }

    #[test]
    fn text_frame_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_text_frame(r#"{"type":"pong"}"#, &tx);
        assert!(matches!(rx.try_recv(), Ok(InboundMessage::Pong)));
    }

    #[test]
    fn malformed_frame_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_text_frame("not json at all", &tx);
        handle_text_frame("{}", &tx);
        handle_text_frame(r#"{"type":"tsukkomi_response"}"#, &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unknown_tag_forwarded_as_unknown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_text_frame(r#"{"type":"stats_update","active_connections":1}"#, &tx);
        assert!(matches!(rx.try_recv(), Ok(InboundMessage::Unknown)));
    }

    #[test]
    fn state_labels() {
        assert_eq!(ConnectionState::Connected.label(), "connected");
        assert_eq!(ConnectionState::Connecting.label(), "connecting");
        assert_eq!(ConnectionState::Disconnected.label(), "disconnected");
    }
}
