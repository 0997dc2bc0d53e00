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

//! damfc - Client for the DAM-FC fan control daemon
//!
//! Turns user gestures into daemon commands over the daemon's Unix socket and
//! keeps the UI in step with the configuration file the daemon persists.

pub mod controller;
pub mod logger;
pub mod view;

#[cfg(test)]
pub mod test_utils;

pub use controller::Controller;
pub use view::ConfigView;

pub use damfc_core::{
    ClientSettings, ConfigStore, FanControlError, FileConfigStore, Result, SettlePolicy,
    Transport, UnixSocketTransport,
};
pub use damfc_protocol::{Command, Configuration, DriverStatus, Fan, TempStep, TemperatureReport};
