//! Unified error handling for damfc
//!
//! This crate provides a single error type used across all damfc components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanControlError
pub type Result<T> = std::result::Result<T, FanControlError>;

/// Unified error type for all damfc operations
#[derive(thiserror::Error, Debug)]
pub enum FanControlError {
    // ============================================================================
    // File System Errors
    // ============================================================================
    /// Missing, unreadable or malformed configuration document.
    /// Recovered locally by substituting the default configuration.
    #[error("Failed to read configuration {path}: {reason}")]
    ConfigRead {
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to write configuration {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Daemon and IPC Errors
    // ============================================================================
    #[error("Could not connect to fan control daemon at {path}: {source}")]
    TransportConnect {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Daemon socket I/O failed: {0}")]
    TransportIo(String),

    #[error("Failed to encode command: {0}")]
    Encoding(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Daemon response error: {0}")]
    DaemonResponse(String),

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The daemon did not write the sent configuration back in time.
    #[error("Daemon did not apply the configuration within {waited_ms} ms")]
    SettleTimeout {
        waited_ms: u64,
    },
}

impl FanControlError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a config read error
    pub fn config_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport I/O error from a string
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportIo(msg.into())
    }

    /// Create a timeout error from a string
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// True when the daemon never received the command (or the socket broke mid-call).
    /// The UI renders these as "could not connect to fan control daemon".
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportConnect { .. } | Self::TransportIo(_) | Self::Timeout(_)
        )
    }
}
