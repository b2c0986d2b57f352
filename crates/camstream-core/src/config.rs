//! Configuration system for camstream.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CAMSTREAM_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/camstream/config.toml
//!   3. ~/.config/camstream/config.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{DEFAULT_MAX_TOTAL_CHUNKS, MAX_PACKET_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CamstreamConfig {
    pub receiver: ReceiverConfig,
    pub sender: SenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Address the datagram socket binds to.
    pub bind_addr: SocketAddr,
    /// Longest wait for a datagram before running a deliver/reap pass.
    pub poll_interval_ms: u64,
    /// Incomplete frames older than this are evicted.
    pub stale_after_ms: u64,
    /// Datagrams declaring more chunks than this are rejected.
    pub max_total_chunks: u8,
    /// Datagrams buffered between the socket task and the reassembler.
    pub queue_depth: usize,
    /// Kernel receive buffer size. 0 = leave the OS default.
    pub recv_buffer_bytes: usize,
    /// How often receiver statistics are logged. 0 = never.
    pub stats_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Where frames are sent.
    pub target_addr: SocketAddr,
    /// Largest datagram emitted, header budget included.
    pub max_packet_size: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5007)),
            poll_interval_ms: 1000,
            stale_after_ms: 2000,
            max_total_chunks: DEFAULT_MAX_TOTAL_CHUNKS,
            queue_depth: 256,
            recv_buffer_bytes: 4 * 1024 * 1024,
            stats_interval_secs: 10,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            target_addr: SocketAddr::from(([127, 0, 0, 1], 5007)),
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl ReceiverConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// Reject settings the receiver cannot run with. A chunk cap below 2
    /// would refuse every multi-chunk frame.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_total_chunks < 2 {
            return Err(ConfigError::Invalid {
                field: "receiver.max_total_chunks",
                reason: format!("{} is below the minimum of 2", self.max_total_chunks),
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "receiver.queue_depth",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// `None` when periodic stats are disabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("camstream")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl CamstreamConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            CamstreamConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.receiver.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CAMSTREAM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&CamstreamConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply CAMSTREAM_* overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("CAMSTREAM_RECEIVER__BIND_ADDR").and_then(|v| v.parse().ok()) {
            self.receiver.bind_addr = v;
        }
        if let Some(v) = var("CAMSTREAM_RECEIVER__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.receiver.poll_interval_ms = v;
        }
        if let Some(v) = var("CAMSTREAM_RECEIVER__STALE_AFTER_MS").and_then(|v| v.parse().ok()) {
            self.receiver.stale_after_ms = v;
        }
        if let Some(v) = var("CAMSTREAM_RECEIVER__MAX_TOTAL_CHUNKS").and_then(|v| v.parse().ok()) {
            self.receiver.max_total_chunks = v;
        }
        if let Some(v) = var("CAMSTREAM_SENDER__TARGET_ADDR").and_then(|v| v.parse().ok()) {
            self.sender.target_addr = v;
        }
    }
}
