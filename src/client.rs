//! Client event loop.
//!
//! [`RealtimeClient`] owns the conversation, the dispatcher, and the
//! push-to-talk recorder, and consumes two event streams in one loop:
//! frontend input events and inbound channel messages. Frontends feed
//! [`InputEvent`]s in and observe the conversation through [`ViewEvent`]s.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{self, Recorder};
use crate::channel::{ChannelHandle, ChannelManager, ConnectionState};
use crate::codec::DecodedAudio;
use crate::config::ClientConfig;
use crate::conversation::{ConversationEntry, ConversationLog, EntryKind};
use crate::dispatch::Dispatcher;
use crate::protocol::{InboundMessage, OutboundMessage};

/// User interaction events from a frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// Push-to-talk pressed.
    PressStart,
    /// Push-to-talk released.
    Release,
    /// Pointer left the control while held. Stops only if recording.
    PointerLeave,
    /// A typed message was submitted.
    SubmitText(String),
    /// Manual retry of the microphone permission probe.
    RequestPermission,
}

/// Events surfaced to a frontend.
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// A conversation entry was appended.
    Entry(ConversationEntry),
    /// The connection state changed.
    Status(ConnectionState),
}

/// The realtime voice chat client.
///
/// Holds a live cpal stream while recording, so the `run` future must be
/// awaited on the task that created the client.
pub struct RealtimeClient {
    config: ClientConfig,
    handle: ChannelHandle,
    inbound_rx: Option<mpsc::UnboundedReceiver<InboundMessage>>,
    dispatcher: Dispatcher,
    log: ConversationLog,
    recorder: Option<Recorder>,
    can_record: bool,
    view_tx: Option<mpsc::UnboundedSender<ViewEvent>>,
    emitted: u64,
    cancel: CancellationToken,
}

impl RealtimeClient {
    /// Create the client and start the background connection task.
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Self {
        let (handle, inbound_rx) = ChannelManager::spawn(
            config.connection.clone(),
            config.reconnect.clone(),
            cancel.child_token(),
        );
        let log = ConversationLog::new(&config.conversation.welcome_message);

        Self {
            config,
            handle,
            inbound_rx: Some(inbound_rx),
            dispatcher: Dispatcher::new(),
            log,
            recorder: None,
            can_record: false,
            view_tx: None,
            emitted: 0,
            cancel,
        }
    }

    /// Surface conversation entries and status changes to a frontend.
    pub fn with_view(mut self, tx: mpsc::UnboundedSender<ViewEvent>) -> Self {
        self.view_tx = Some(tx);
        self
    }

    /// Route decoded response audio to a playback task.
    pub fn with_playback(mut self, tx: mpsc::UnboundedSender<DecodedAudio>) -> Self {
        self.dispatcher = Dispatcher::new().with_playback(tx);
        self
    }

    /// Handle to the connection for state observation.
    pub fn channel(&self) -> &ChannelHandle {
        &self.handle
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    /// Run the event loop until cancelled or both event sources close.
    pub async fn run(mut self, mut input_rx: mpsc::UnboundedReceiver<InputEvent>) {
        let Some(mut inbound_rx) = self.inbound_rx.take() else {
            return;
        };
        let cancel = self.cancel.clone();
        let mut state_rx = self.handle.state_watch();

        // Startup permission probe; failure renders remediation and leaves
        // recording disabled until a manual retry.
        self.try_permission();
        self.flush_view();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = input_rx.recv() => match event {
                    Some(event) => self.handle_input(event),
                    None => break,
                },
                msg = inbound_rx.recv() => match msg {
                    Some(msg) => self.dispatcher.dispatch(msg, &mut self.log),
                    None => break,
                },
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    info!("connection state: {}", state.label());
                    if let Some(ref tx) = self.view_tx {
                        let _ = tx.send(ViewEvent::Status(state));
                    }
                }
            }
            self.flush_view();
        }

        info!("client event loop stopped");
    }

    fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PressStart => self.start_recording(),
            InputEvent::Release => self.stop_recording(),
            InputEvent::PointerLeave => {
                if self.recorder.as_ref().is_some_and(Recorder::is_recording) {
                    self.stop_recording();
                }
            }
            InputEvent::SubmitText(text) => self.submit_text(&text),
            InputEvent::RequestPermission => self.try_permission(),
        }
    }

    fn start_recording(&mut self) {
        if !self.can_record {
            // One automatic retry, mirroring the probe-on-press behavior.
            self.try_permission();
            if !self.can_record {
                return;
            }
        }
        if !self.handle.is_connected() {
            debug!("not connected, ignoring record start");
            return;
        }
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if let Err(e) = recorder.start() {
            warn!("failed to start recording: {e}");
            self.log
                .append(EntryKind::Error, format!("Recording failed: {e}"), None);
        }
    }

    fn stop_recording(&mut self) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        match recorder.stop() {
            Ok(Some(payload)) => {
                self.handle.send(&OutboundMessage::audio(payload));
                self.log
                    .append(EntryKind::User, "🎤 voice message", None);
            }
            Ok(None) => {}
            Err(e) => warn!("failed to finalize recording: {e}"),
        }
    }

    fn submit_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.handle.is_connected() {
            debug!("dropping text message while disconnected");
            return;
        }
        self.handle.send(&OutboundMessage::text(text));
        self.log.append(EntryKind::User, text, None);
    }

    fn try_permission(&mut self) {
        match capture::request_permission() {
            Ok(()) => {
                if self.recorder.is_none() {
                    match Recorder::new(&self.config.audio) {
                        Ok(recorder) => self.recorder = Some(recorder),
                        Err(e) => {
                            warn!("failed to open recorder: {e}");
                            self.log.append(
                                EntryKind::Error,
                                format!("Could not open the microphone: {e}"),
                                None,
                            );
                            return;
                        }
                    }
                }
                if !self.can_record {
                    self.can_record = true;
                    self.log
                        .append(EntryKind::System, "Microphone ready", None);
                }
            }
            Err(e) => {
                warn!("microphone permission: {e}");
                self.can_record = false;
                self.log.append(EntryKind::Error, e.remediation(), None);
            }
        }
    }

    /// Forward entries appended since the last flush to the view channel.
    fn flush_view(&mut self) {
        let total = self.log.total_appended();
        let Some(ref tx) = self.view_tx else {
            self.emitted = total;
            return;
        };
        let new = (total - self.emitted) as usize;
        if new == 0 {
            return;
        }
        let entries = self.log.entries();
        let start = entries.len().saturating_sub(new);
        for entry in &entries[start..] {
            let _ = tx.send(ViewEvent::Entry(entry.clone()));
        }
        self.emitted = total;
    }
}
