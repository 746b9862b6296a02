//! Tsukkomi client: real-time duplex voice chat with a manzai tsukkomi server.
//!
//! The client keeps a persistent WebSocket connection open, multiplexes
//! push-to-talk audio and typed text into tagged JSON messages, and renders
//! server-pushed responses (text plus inline audio) as a live conversation.
//!
//! # Architecture
//!
//! Independent pieces connected by async channels:
//! - **Capture**: push-to-talk microphone recording via `cpal`
//! - **Codec**: WAV framing + base64 transport encoding
//! - **Channel**: background WebSocket task with automatic reconnection
//! - **Dispatch**: routes inbound messages to conversation and playback
//! - **Conversation**: append-only log rendered by frontends
//! - **Playback**: response audio to the speakers via `cpal`

pub mod capture;
pub mod channel;
pub mod client;
pub mod codec;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod playback;
pub mod protocol;

pub use channel::{ChannelHandle, ChannelManager, ConnectionState};
pub use client::{InputEvent, RealtimeClient, ViewEvent};
pub use config::ClientConfig;
pub use conversation::{ConversationEntry, ConversationLog, EntryKind};
pub use error::{ClientError, Result};
pub use protocol::{InboundMessage, OutboundMessage};
