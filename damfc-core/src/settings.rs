//! Client Settings
//!
//! Persistent client-side settings stored as JSON in ~/.config/damfc/client.json.
//! Every field is optional in the file; missing ones take the built-in defaults,
//! which point at the daemon's well-known socket and configuration paths.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use damfc_error::{FanControlError, Result};
use tracing::debug;

use crate::constants::{paths, timing};
use crate::daemon_client::UnixSocketTransport;
use crate::settle::SettlePolicy;
use crate::store::FileConfigStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Daemon command socket
    pub socket_path: PathBuf,
    /// Configuration document shared with the daemon
    pub config_path: PathBuf,
    /// Socket read/write timeout
    pub timeout_ms: u64,
    /// Upper bound on waiting for the daemon to persist an update
    pub settle_timeout_ms: u64,
    pub settle_poll_ms: u64,
    /// tracing filter directive, e.g. "info" or "damfc=debug"
    pub log_level: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(paths::SOCKET_PATH),
            config_path: PathBuf::from(paths::CONFIG_PATH),
            timeout_ms: timing::SOCKET_TIMEOUT_MS,
            settle_timeout_ms: timing::SETTLE_TIMEOUT_MS,
            settle_poll_ms: timing::SETTLE_POLL_MS,
            log_level: "info".to_string(),
        }
    }
}

impl ClientSettings {
    /// Load from the per-user settings file, defaults if it does not exist
    pub fn load() -> Result<Self> {
        match paths::client_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No client settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            FanControlError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let settings: Self = serde_json::from_str(&content).map_err(|e| {
            FanControlError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(FanControlError::config("timeout_ms must be greater than 0"));
        }
        if self.settle_poll_ms == 0 {
            return Err(FanControlError::config("settle_poll_ms must be greater than 0"));
        }
        if self.settle_poll_ms > self.settle_timeout_ms {
            return Err(FanControlError::config(format!(
                "settle_poll_ms ({}) must not exceed settle_timeout_ms ({})",
                self.settle_poll_ms, self.settle_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy::new(
            Duration::from_millis(self.settle_timeout_ms),
            Duration::from_millis(self.settle_poll_ms),
        )
    }

    pub fn transport(&self) -> UnixSocketTransport {
        UnixSocketTransport::new(&self.socket_path).with_timeout(self.socket_timeout())
    }

    pub fn store(&self) -> FileConfigStore {
        FileConfigStore::new(&self.config_path)
    }
}
