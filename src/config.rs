//! Configuration types for the realtime client.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server connection settings.
    pub connection: ConnectionConfig,
    /// Reconnect behavior after a closed connection.
    pub reconnect: ReconnectConfig,
    /// Audio capture/playback settings.
    pub audio: AudioConfig,
    /// Conversation view settings.
    pub conversation: ConversationConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Full WebSocket endpoint URL.
    pub server_url: String,
    /// Heartbeat ping interval in seconds. 0 disables the heartbeat.
    pub ping_interval_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8000/ws".to_owned(),
            ping_interval_secs: 30,
        }
    }
}

/// Reconnect delay growth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectPolicy {
    /// Constant delay between attempts (source behavior).
    Fixed,
    /// Delay doubles per attempt, capped at `max_delay_ms`.
    Exponential,
}

/// Reconnect configuration.
///
/// The default preserves the original contract: every closure schedules
/// exactly one retry after a fixed 3 s delay, with no attempt cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// How the delay grows across consecutive failures.
    pub policy: ReconnectPolicy,
    /// Upper bound on the delay when the policy is exponential.
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failed attempts (None = retry forever).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3000,
            policy: ReconnectPolicy::Fixed,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (0-based count of consecutive failures).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.initial_delay_ms);
        match self.policy {
            ReconnectPolicy::Fixed => base,
            ReconnectPolicy::Exponential => base
                .saturating_mul(2u32.saturating_pow(attempt.min(5)))
                .min(Duration::from_millis(self.max_delay_ms)),
        }
    }

    /// Whether another attempt is allowed after `attempt` consecutive failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of capture channels (1 = mono).
    pub channels: u16,
    /// Length of one recording fragment in milliseconds.
    pub fragment_interval_ms: u64,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            fragment_interval_ms: 100,
            input_device: None,
            output_device: None,
        }
    }
}

/// Conversation view configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Placeholder shown before the first real entry arrives.
    pub welcome_message: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Press and hold to talk, or type a message. The AI will talk back."
                .to_owned(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| ClientError::Config(format!("parse {path:?}: {e}")))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("serialize: {e}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Default config file location (`~/.config/tsukkomi/config.toml`).
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tsukkomi")
            .join("config.toml")
    }
}

/// Build the WebSocket endpoint for a host, selecting the scheme from
/// whether the session itself is secure (wss for secure, ws otherwise).
///
/// # Errors
///
/// Returns an error if the host does not form a valid URL.
pub fn websocket_url(host: &str, secure: bool) -> Result<String> {
    let scheme = if secure { "wss" } else { "ws" };
    let url = url::Url::parse(&format!("{scheme}://{host}/ws"))
        .map_err(|e| ClientError::Config(format!("invalid host '{host}': {e}")))?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_behavior() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect.initial_delay_ms, 3000);
        assert_eq!(config.reconnect.policy, ReconnectPolicy::Fixed);
        assert!(config.reconnect.max_attempts.is_none());
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.fragment_interval_ms, 100);
        assert_eq!(config.connection.ping_interval_secs, 30);
    }

    #[test]
    fn fixed_policy_delay_is_constant() {
        let config = ReconnectConfig::default();
        for attempt in 0u32..10 {
            assert_eq!(config.delay_for(attempt), Duration::from_millis(3000));
        }
    }

    #[test]
    fn exponential_delay_capped() {
        let config = ReconnectConfig {
            initial_delay_ms: 1000,
            policy: ReconnectPolicy::Exponential,
            max_delay_ms: 30_000,
            max_attempts: None,
        };
        for attempt in 0u32..20 {
            assert!(config.delay_for(attempt) <= Duration::from_millis(30_000));
        }
        assert_eq!(config.delay_for(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for(1), Duration::from_millis(2000));
    }

    #[test]
    fn attempt_cap_respected() {
        let unbounded = ReconnectConfig::default();
        assert!(unbounded.should_retry(1_000_000));

        let capped = ReconnectConfig {
            max_attempts: Some(3),
            ..ReconnectConfig::default()
        };
        assert!(capped.should_retry(2));
        assert!(!capped.should_retry(3));
    }

    #[test]
    fn websocket_url_scheme_selection() {
        let insecure = websocket_url("localhost:8000", false).unwrap();
        assert_eq!(insecure, "ws://localhost:8000/ws");
        let secure = websocket_url("example.com", true).unwrap();
        assert_eq!(secure, "wss://example.com/ws");
    }

    #[test]
    fn config_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ClientConfig::default();
        config.connection.server_url = "ws://example.com/ws".to_owned();
        config.reconnect.max_attempts = Some(5);
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded.connection.server_url, "ws://example.com/ws");
        assert_eq!(loaded.reconnect.max_attempts, Some(5));
    }
}
