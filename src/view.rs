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

use damfc_core::FanControlError;
use damfc_protocol::Configuration;

/// The user interface as seen by the [`Controller`](crate::Controller).
///
/// Implementations own the widgets: they turn user input into a
/// `Configuration` and show configurations and failures back to the user.
pub trait ConfigView {
    /// Current UI-bound values (bounds, dynamic flag, six curve points)
    fn snapshot(&self) -> Configuration;

    /// Show `config` to the user
    fn render(&mut self, config: &Configuration);

    /// Reflect who controls the fans (curve vs. manual)
    fn set_dynamic_mode(&mut self, enabled: bool);

    /// Tell the user an action did not happen
    fn show_error(&mut self, error: &FanControlError);
}
