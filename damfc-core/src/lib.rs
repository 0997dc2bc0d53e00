//! damfc Core Library
//!
//! Client-side plumbing for the DAM-FC fan control daemon.
//!
//! # Module Structure
//!
//! - `store` - Load/save of the shared configuration document
//! - `daemon_client` - Unix socket transport to the daemon
//! - `settle` - Waiting for the daemon to persist an update
//! - `settings` - Client settings (paths, timeouts, log level)
//! - `constants` - Well-known paths and limits
//!
//! # Example
//!
//! ```no_run
//! use damfc_core::{ClientSettings, ConfigStore, Transport};
//! use damfc_protocol::{Command, Fan};
//!
//! let settings = ClientSettings::load()?;
//! let config = settings.store().load(false).into_config();
//! settings.transport().send(&Command::set_fan_speed(Fan::Gpu, config.max_speed))?;
//! # Ok::<(), damfc_core::FanControlError>(())
//! ```

pub mod constants;
pub mod daemon_client;
pub mod settings;
pub mod settle;
pub mod store;

pub use damfc_error::{FanControlError, Result};

pub use daemon_client::{driver_status, read_temperatures, Transport, UnixSocketTransport};
#[cfg(any(test, feature = "mock"))]
pub use daemon_client::MockTransport;

pub use settings::ClientSettings;
pub use settle::{wait_for_config, SettlePolicy};
pub use store::{ConfigStore, FileConfigStore, Loaded, MemoryConfigStore};
