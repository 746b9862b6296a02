//! Wire protocol types: JSON text frames over the duplex WebSocket.
//!
//! One JSON object per frame, discriminated by a `type` tag. Outbound
//! timestamps are RFC3339; inbound timestamps are kept as opaque strings
//! because the peer emits naive ISO-8601 without a timezone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A finished voice recording, base64-encoded WAV.
    AudioData {
        audio_data: String,
        timestamp: DateTime<Utc>,
    },
    /// A typed text message.
    TextMessage {
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// Liveness probe.
    Ping { timestamp: DateTime<Utc> },
}

impl OutboundMessage {
    /// Build an audio message stamped with the current time.
    pub fn audio(audio_data: String) -> Self {
        Self::AudioData {
            audio_data,
            timestamp: Utc::now(),
        }
    }

    /// Build a text message stamped with the current time.
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextMessage {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Build a ping stamped with the current time.
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now(),
        }
    }
}

/// Messages received from the server.
///
/// Unrecognized `type` tags deserialize to [`InboundMessage::Unknown`] so a
/// newer peer never breaks the connection (forward-compatible ignore).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Handshake acknowledgement carrying the peer-assigned identity.
    ConnectionEstablished {
        connection_id: String,
        #[serde(default)]
        message: String,
    },
    /// An AI retort, optionally with synthesized audio and the echoed input.
    TsukkomiResponse {
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        audio_data: Option<String>,
        #[serde(default)]
        original_text: Option<String>,
    },
    /// Server-side failure report.
    Error { message: String },
    /// Liveness acknowledgement.
    Pong,
    /// Any tag this client does not know about.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_text_message_serializes_tagged() {
        let msg = OutboundMessage::text("こんにちは");
        let json = serde_json::to_string(&msg).unwrap_or_default();
        assert!(json.contains("\"type\":\"text_message\""));
        assert!(json.contains("\"text\":\"こんにちは\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn outbound_audio_serializes_tagged() {
        let msg = OutboundMessage::audio("QUJD".to_owned());
        let json = serde_json::to_string(&msg).unwrap_or_default();
        assert!(json.contains("\"type\":\"audio_data\""));
        assert!(json.contains("\"audio_data\":\"QUJD\""));
    }

    #[test]
    fn outbound_ping_serializes_tagged() {
        let json = serde_json::to_string(&OutboundMessage::ping()).unwrap_or_default();
        assert!(json.contains("\"type\":\"ping\""));
    }

    #[test]
    fn inbound_connection_established() {
        let json = r#"{"type":"connection_established","connection_id":"abc-123","message":"welcome","timestamp":"2024-01-01T00:00:00"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        match msg {
            InboundMessage::ConnectionEstablished {
                connection_id,
                message,
            } => {
                assert_eq!(connection_id, "abc-123");
                assert_eq!(message, "welcome");
            }
            _ => unreachable!("expected ConnectionEstablished"),
        }
    }

    #[test]
    fn inbound_tsukkomi_response_full() {
        let json = r#"{"type":"tsukkomi_response","text":"ツッコミ","timestamp":"2024-01-01T12:00:00.123456","audio_data":"QUJD","original_text":"こんにちは"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        match msg {
            InboundMessage::TsukkomiResponse {
                text,
                timestamp,
                audio_data,
                original_text,
            } => {
                assert_eq!(text, "ツッコミ");
                assert_eq!(timestamp.as_deref(), Some("2024-01-01T12:00:00.123456"));
                assert_eq!(audio_data.as_deref(), Some("QUJD"));
                assert_eq!(original_text.as_deref(), Some("こんにちは"));
            }
            _ => unreachable!("expected TsukkomiResponse"),
        }
    }

    #[test]
    fn inbound_tsukkomi_response_minimal() {
        let json = r#"{"type":"tsukkomi_response","text":"なんでやねん"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        match msg {
            InboundMessage::TsukkomiResponse {
                audio_data,
                original_text,
                ..
            } => {
                assert!(audio_data.is_none());
                assert!(original_text.is_none());
            }
            _ => unreachable!("expected TsukkomiResponse"),
        }
    }

    #[test]
    fn inbound_pong_ignores_extra_fields() {
        let json = r#"{"type":"pong","timestamp":"2024-01-01T00:00:00"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        assert!(matches!(msg, InboundMessage::Pong));
    }

    #[test]
    fn inbound_error() {
        let json = r#"{"type":"error","message":"oops"}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        match msg {
            InboundMessage::Error { message } => assert_eq!(message, "oops"),
            _ => unreachable!("expected Error"),
        }
    }

    #[test]
    fn inbound_unknown_tag_is_tolerated() {
        let json = r#"{"type":"stats_update","active_connections":3}"#;
        let msg: InboundMessage = serde_json::from_str(json).unwrap_or_else(|e| {
            panic!("parse failed: {e}");
        });
        assert!(matches!(msg, InboundMessage::Unknown));
    }
}
