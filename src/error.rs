//! Error types for the tsukkomi client.

/// Top-level error type for the realtime client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// WebSocket transport error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload encoding/decoding error.
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ClientError>;
