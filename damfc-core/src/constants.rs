//! Constants and configuration values for damfc
//!
//! Centralizes the well-known paths, timeouts and size limits shared with
//! the daemon. Add new magic numbers here rather than inline.

use std::time::Duration;

/// Well-known filesystem locations
pub mod paths {
    use std::path::PathBuf;

    /// Unix domain socket the daemon accepts commands on
    pub const SOCKET_PATH: &str = "/var/run/fan_control_daemon.sock";

    /// Configuration document written by both the daemon and this client
    pub const CONFIG_PATH: &str = "/var/lib/acer_fan_control/config.json";

    /// Per-user directory for client settings, under the XDG config dir
    pub const CLIENT_DIR: &str = "damfc";

    /// Client settings file name
    pub const CLIENT_SETTINGS_FILE: &str = "client.json";

    /// Suffix of the per-save temp files used for atomic configuration writes
    pub const TEMP_SUFFIX: &str = ".tmp";

    /// `~/.config/damfc/client.json`, if a config dir can be determined
    pub fn client_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CLIENT_DIR).join(CLIENT_SETTINGS_FILE))
    }
}

/// Timeouts for daemon communication
pub mod timing {
    use super::Duration;

    /// Socket connect/read/write timeout per call
    pub const SOCKET_TIMEOUT_MS: u64 = 2000;

    /// Upper bound on waiting for the daemon to write back an `update_config`
    pub const SETTLE_TIMEOUT_MS: u64 = 1500;

    /// Interval between configuration re-reads while settling.
    /// The first re-read happens after one interval.
    pub const SETTLE_POLL_MS: u64 = 100;

    /// Pause between connect attempts while the daemon's backlog is full
    pub const CONNECT_RETRY_MS: u64 = 10;

    pub const SOCKET_TIMEOUT: Duration = Duration::from_millis(SOCKET_TIMEOUT_MS);
    pub const SETTLE_TIMEOUT: Duration = Duration::from_millis(SETTLE_TIMEOUT_MS);
    pub const SETTLE_POLL: Duration = Duration::from_millis(SETTLE_POLL_MS);
    pub const CONNECT_RETRY: Duration = Duration::from_millis(CONNECT_RETRY_MS);
}

/// Size limits
pub mod limits {
    /// Configuration documents larger than this are treated as corrupt
    pub const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

    /// Largest reply accepted from a query
    pub const MAX_REPLY_SIZE: usize = 64 * 1024;

    pub use damfc_protocol::MAX_MESSAGE_SIZE;
}
