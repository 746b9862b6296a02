//! Inbound message dispatch.
//!
//! Routes each parsed [`InboundMessage`] to its effect: conversation
//! appends, identity bookkeeping, and audio decode for playback. Unknown
//! messages are logged and dropped without touching any state.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{self, DecodedAudio};
use crate::conversation::{ConversationLog, EntryKind};
use crate::protocol::InboundMessage;

/// Routes inbound messages to conversation and playback.
pub struct Dispatcher {
    connection_id: Option<String>,
    /// Decoded response audio is handed off here; `None` runs headless
    /// (tests, or audio output disabled).
    playback_tx: Option<mpsc::UnboundedSender<DecodedAudio>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            connection_id: None,
            playback_tx: None,
        }
    }

    /// Route decoded response audio to a playback task.
    pub fn with_playback(mut self, tx: mpsc::UnboundedSender<DecodedAudio>) -> Self {
        self.playback_tx = Some(tx);
        self
    }

    /// Identity assigned by the server, once the handshake has completed.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Apply one inbound message.
    pub fn dispatch(&mut self, msg: InboundMessage, log: &mut ConversationLog) {
        match msg {
            InboundMessage::ConnectionEstablished {
                connection_id,
                message,
            } => {
                info!("connection established: {connection_id}");
                self.connection_id = Some(connection_id);
                let notice = if message.is_empty() {
                    "Connected to server".to_owned()
                } else {
                    message
                };
                log.append(EntryKind::System, notice, None);
            }
            InboundMessage::TsukkomiResponse {
                text,
                timestamp,
                audio_data,
                original_text,
            } => {
                log.append(EntryKind::Ai, text, timestamp);

                if let Some(payload) = audio_data {
                    match codec::decode_audio_payload(&payload) {
                        Ok(audio) => {
                            if let Some(ref tx) = self.playback_tx {
                                // Receiver gone means playback has shut down.
                                let _ = tx.send(audio);
                            }
                        }
                        Err(e) => warn!("dropping undecodable response audio: {e}"),
                    }
                }

                // The echoed user input renders after the response, in field
                // processing order.
                if let Some(original) = original_text {
                    log.append(EntryKind::User, original, None);
                }
            }
            InboundMessage::Error { message } => {
                warn!("server error: {message}");
                log.append(EntryKind::Error, message, None);
            }
            InboundMessage::Pong => {
                debug!("pong received");
            }
            InboundMessage::Unknown => {
                debug!("ignoring unrecognized message type");
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
