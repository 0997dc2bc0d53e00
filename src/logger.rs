/*
 * This file is part of damfc.
 *
 * Copyright (C) 2025 DAM-FC contributors
 *
 * damfc is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * damfc is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with damfc. If not, see <https://www.gnu.org/licenses/>.
 */

use damfc_core::{ClientSettings, FanControlError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber filtered by `directive` ("info", "damfc=debug", ...).
///
/// The filter comes from the caller, never from the environment. Fails if the
/// directive does not parse or a subscriber is already installed.
pub fn init_tracing(directive: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directive).map_err(|e| {
        FanControlError::config(format!("Invalid log level {:?}: {}", directive, e))
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| FanControlError::config(format!("Logging already initialized: {}", e)))
}

/// [`init_tracing`] with the level from client settings
pub fn init_from_settings(settings: &ClientSettings) -> Result<()> {
    init_tracing(&settings.log_level)
}
