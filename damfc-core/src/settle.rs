//! Waiting for the daemon to persist an `update_config`
//!
//! The daemon never acknowledges commands, so after sending a configuration
//! the only evidence that it was applied is the document on disk. Instead of
//! sleeping a fixed amount and hoping, poll the store until it holds what was
//! sent, and give up with a definite error once the timeout elapses.

use std::thread;
use std::time::{Duration, Instant};

use damfc_error::{FanControlError, Result};
use damfc_protocol::Configuration;
use tracing::{debug, warn};

use crate::constants::timing;
use crate::store::ConfigStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Give up after this long
    pub timeout: Duration,
    /// Sleep before each re-read
    pub poll_interval: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            timeout: timing::SETTLE_TIMEOUT,
            poll_interval: timing::SETTLE_POLL,
        }
    }
}

impl SettlePolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Check the store exactly once, without sleeping
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

/// Poll `store` until it holds `expected` (after backfill).
///
/// Returns the configuration read back on success. A store that still holds
/// something else, or nothing readable, when the timeout elapses yields
/// [`FanControlError::SettleTimeout`].
pub fn wait_for_config<S>(
    store: &S,
    expected: &Configuration,
    policy: SettlePolicy,
) -> Result<Configuration>
where
    S: ConfigStore + ?Sized,
{
    let expected = expected.clone().backfilled();
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        thread::sleep(policy.poll_interval);
        attempts += 1;

        let loaded = store.load(true);
        if loaded.fallback.is_none() && loaded.config == expected {
            debug!(
                "Configuration settled after {} read(s) in {:?}",
                attempts,
                started.elapsed()
            );
            return Ok(loaded.config);
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            warn!(
                "Daemon did not write the new configuration within {:?} ({} reads)",
                policy.timeout, attempts
            );
            return Err(FanControlError::SettleTimeout {
                waited_ms: waited.as_millis() as u64,
            });
        }
    }
}
