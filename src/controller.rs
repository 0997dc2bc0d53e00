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

use damfc_core::{
    daemon_client, wait_for_config, ClientSettings, ConfigStore, FileConfigStore, Result,
    SettlePolicy, Transport, UnixSocketTransport,
};
use damfc_protocol::{Command, Configuration, DriverStatus, Fan, TemperatureReport};
use tracing::{debug, error, info};

use crate::view::ConfigView;

/// Orchestrates user gestures into daemon commands and keeps the UI in
/// step with what the daemon persisted.
///
/// Every operation takes `&mut self`: one command is in flight at a time.
/// A failed send leaves `current` untouched and is reported both to the
/// caller and to the view.
pub struct Controller<T, S, V> {
    transport: T,
    store: S,
    view: V,
    settle: SettlePolicy,
    current: Configuration,
}

impl<V: ConfigView> Controller<UnixSocketTransport, FileConfigStore, V> {
    /// Controller wired to the daemon socket and config file named in `settings`
    pub fn from_settings(settings: &ClientSettings, view: V) -> Self {
        Controller::new(settings.transport(), settings.store(), view)
            .with_settle_policy(settings.settle_policy())
    }
}

impl<T, S, V> Controller<T, S, V>
where
    T: Transport,
    S: ConfigStore,
    V: ConfigView,
{
    pub fn new(transport: T, store: S, view: V) -> Self {
        Self {
            transport,
            store,
            view,
            settle: SettlePolicy::default(),
            current: Configuration::default(),
        }
    }

    pub fn with_settle_policy(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    /// Configuration the UI currently reflects
    pub fn current(&self) -> &Configuration {
        &self.current
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Initial load when the window opens
    pub fn open(&mut self) -> &Configuration {
        let loaded = self.store.load(false);
        if let Some(reason) = &loaded.fallback {
            debug!("Starting from default configuration: {}", reason);
        }
        self.current = loaded.into_config();
        self.view.render(&self.current);
        &self.current
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        debug!("Idle -> Sending {}", command.type_name());
        match self.transport.send(&command) {
            Ok(()) => {
                debug!("Sent {} -> Idle", command.type_name());
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {}", command.type_name(), e);
                self.view.show_error(&e);
                Err(e)
            }
        }
    }

    fn surface<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            error!("Daemon query failed: {}", e);
            self.view.show_error(e);
        }
        result
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Send the UI's configuration, wait for the daemon to persist it, then
    /// reload and re-render from disk.
    ///
    /// If the daemon does not write the document back within the settle
    /// timeout, the on-disk state is still rendered and `SettleTimeout` is
    /// returned.
    pub fn apply_ui_config(&mut self) -> Result<Configuration> {
        let snapshot = self.view.snapshot();
        self.dispatch(Command::update_config(snapshot.clone()))?;

        debug!("Settling");
        let settled = wait_for_config(&self.store, &snapshot, self.settle);
        let reloaded = match &settled {
            Ok(config) => config.clone(),
            Err(_) => self.store.load(true).into_config(),
        };

        debug!("Reloaded -> Idle");
        self.current = reloaded.clone();
        self.view.render(&self.current);

        match settled {
            Ok(_) => Ok(reloaded),
            Err(e) => {
                self.view.show_error(&e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Fan speed
    // ========================================================================

    /// Set one fan explicitly. Manual control turns dynamic mode off.
    pub fn set_manual_speed(&mut self, fan: u8, speed: i32) -> Result<()> {
        self.dispatch(Command::SetFanSpeed { fan, speed })?;
        self.disable_dynamic_mode()
    }

    /// Set CPU and GPU fans to the same speed, then turn dynamic mode off
    pub fn set_all_fans(&mut self, speed: i32) -> Result<()> {
        for fan in Fan::ALL {
            self.dispatch(Command::set_fan_speed(fan, speed))?;
        }
        self.disable_dynamic_mode()
    }

    /// Both fans to the configured maximum
    pub fn max_speed(&mut self) -> Result<()> {
        let max = self.current.max_speed;
        self.set_all_fans(max)
    }

    /// Persist the UI values with dynamic mode off, then apply the two manual speeds
    pub fn apply_manual_settings(&mut self, cpu_speed: i32, gpu_speed: i32) -> Result<()> {
        let mut snapshot = self.view.snapshot();
        snapshot.dynamic_mode = false;

        self.dispatch(Command::update_config(snapshot))?;
        self.dispatch(Command::set_fan_speed(Fan::Cpu, cpu_speed))?;
        self.dispatch(Command::set_fan_speed(Fan::Gpu, gpu_speed))?;
        self.disable_dynamic_mode()
    }

    fn disable_dynamic_mode(&mut self) -> Result<()> {
        self.dispatch(Command::set_dynamic_mode(false))?;
        self.view.set_dynamic_mode(false);
        self.current.dynamic_mode = false;
        Ok(())
    }

    // ========================================================================
    // Dynamic mode
    // ========================================================================

    pub fn set_dynamic_mode(&mut self, enabled: bool) -> Result<()> {
        self.dispatch(Command::set_dynamic_mode(enabled))?;
        self.current.dynamic_mode = enabled;
        Ok(())
    }

    /// Dynamic-mode checkbox: switch the mode, then push the UI values so the
    /// persisted document agrees
    pub fn toggle_dynamic_mode(&mut self, enabled: bool) -> Result<()> {
        self.set_dynamic_mode(enabled)?;
        let mut snapshot = self.view.snapshot();
        snapshot.dynamic_mode = enabled;
        self.dispatch(Command::update_config(snapshot))
    }

    // ========================================================================
    // Driver lifecycle
    // ========================================================================

    pub fn compile_drivers(&mut self) -> Result<()> {
        info!("Requesting driver compilation");
        self.dispatch(Command::CompileDrivers)
    }

    pub fn load_drivers(&mut self) -> Result<()> {
        info!("Requesting driver load");
        self.dispatch(Command::LoadDrivers)
    }

    pub fn unload_drivers(&mut self) -> Result<()> {
        info!("Requesting driver unload");
        self.dispatch(Command::UnloadDrivers)
    }

    pub fn clean_drivers(&mut self) -> Result<()> {
        info!("Requesting removal of compiled drivers");
        self.dispatch(Command::CleanCompiledDrivers)
    }

    /// Unload, rebuild and reload in one daemon-side step
    pub fn reload_drivers(&mut self) -> Result<()> {
        info!("Requesting driver reload");
        self.dispatch(Command::ReloadCompiledDrivers)
    }

    pub fn compile_and_load_drivers(&mut self) -> Result<()> {
        self.compile_drivers()?;
        self.load_drivers()
    }

    pub fn clean_and_unload_drivers(&mut self) -> Result<()> {
        self.clean_drivers()?;
        self.unload_drivers()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn read_temperatures(&mut self) -> Result<TemperatureReport> {
        let result = daemon_client::read_temperatures(&self.transport);
        self.surface(result)
    }

    pub fn driver_status(&mut self) -> Result<DriverStatus> {
        let result = daemon_client::driver_status(&self.transport);
        self.surface(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_config, LoopbackDaemon, RecordingView};
    use damfc_core::{FanControlError, MemoryConfigStore, MockTransport};
    use damfc_protocol::{TempStep, TEMP_STEP_COUNT};
    use mockall::Sequence;
    use std::io;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn connect_error() -> FanControlError {
        FanControlError::TransportConnect {
            path: PathBuf::from("/var/run/fan_control_daemon.sock"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        }
    }

    fn loopback() -> (
        Controller<Arc<LoopbackDaemon>, Arc<MemoryConfigStore>, RecordingView>,
        Arc<LoopbackDaemon>,
        Arc<MemoryConfigStore>,
    ) {
        let store = Arc::new(MemoryConfigStore::new());
        let daemon = Arc::new(LoopbackDaemon::new(Arc::clone(&store)));
        let controller = Controller::new(
            Arc::clone(&daemon),
            Arc::clone(&store),
            RecordingView::new(sample_config()),
        )
        .with_settle_policy(SettlePolicy::immediate());
        (controller, daemon, store)
    }

    #[test]
    fn test_open_renders_defaults_without_document() {
        let (mut controller, daemon, _) = loopback();
        let current = controller.open().clone();
        assert_eq!(current, Configuration::default());
        assert_eq!(controller.view().rendered, vec![Configuration::default()]);
        assert!(daemon.sent().is_empty());
    }

    #[test]
    fn test_open_backfills_stored_document() {
        let (mut controller, _, store) = loopback();
        let mut short = sample_config();
        short.temp_steps.truncate(3);
        store.replace(Some(short));

        assert_eq!(controller.open().temp_steps.len(), TEMP_STEP_COUNT);
    }

    #[test]
    fn test_manual_speed_sends_speed_then_disables_dynamic_mode() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        mock.expect_send()
            .withf(|cmd| *cmd == Command::SetFanSpeed { fan: 1, speed: 2000 })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_send()
            .withf(|cmd| *cmd == Command::set_dynamic_mode(false))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let store = MemoryConfigStore::new();
        let mut controller = Controller::new(mock, store, RecordingView::new(Configuration::default()));
        controller.open();
        let curve_before = controller.current().temp_steps.clone();

        controller.set_manual_speed(1, 2000).unwrap();

        assert!(!controller.current().dynamic_mode);
        assert_eq!(controller.current().temp_steps, curve_before);
        assert_eq!(controller.view().dynamic_flags, vec![false]);
        assert!(controller.store().document().is_none());
    }

    #[test]
    fn test_manual_speed_with_bad_fan_sends_nothing_further() {
        let (mut controller, daemon, _) = loopback();
        controller.open();

        assert!(matches!(
            controller.set_manual_speed(5, 1000),
            Err(FanControlError::InvalidCommand(_))
        ));
        assert!(daemon.sent().is_empty());
        assert!(controller.current().dynamic_mode);
        assert_eq!(controller.view().errors.len(), 1);
    }

    #[test]
    fn test_apply_ui_config_sends_once_and_reloads() {
        let (mut controller, daemon, store) = loopback();
        controller.open();

        let reloaded = controller.apply_ui_config().unwrap();

        assert_eq!(daemon.sent(), vec![Command::update_config(sample_config())]);
        assert_eq!(reloaded, sample_config());
        assert_eq!(controller.current(), &sample_config());
        assert_eq!(controller.view().rendered.last(), Some(&sample_config()));
        assert_eq!(store.document(), Some(sample_config()));
        assert!(controller.view().errors.is_empty());
    }

    #[test]
    fn test_apply_ui_config_times_out_and_renders_disk_state() {
        let (mut controller, daemon, store) = loopback();
        daemon.set_apply_updates(false);
        store.replace(Some(Configuration::default()));
        controller.open();

        let result = controller.apply_ui_config();

        assert!(matches!(result, Err(FanControlError::SettleTimeout { .. })));
        assert_eq!(daemon.sent().len(), 1);
        assert_eq!(controller.current(), &Configuration::default());
        assert_eq!(controller.view().rendered.len(), 2);
        assert_eq!(controller.view().errors.len(), 1);
    }

    #[test]
    fn test_apply_ui_config_reflects_daemon_rewrite() {
        let (mut controller, daemon, _) = loopback();
        // A daemon that clamps speeds before persisting never matches the sent
        // document; the UI must still show what ended up on disk.
        daemon.set_rewrite(|mut config| {
            for step in &mut config.temp_steps {
                step.speed = step.speed.min(2000);
            }
            config
        });
        controller.open();

        assert!(controller.apply_ui_config().is_err());
        assert!(controller.current().temp_steps.iter().all(|s| s.speed <= 2000));
    }

    #[test]
    fn test_transport_failure_leaves_state_unchanged() {
        let mut mock = MockTransport::new();
        mock.expect_send().returning(|_| Err(connect_error()));

        let store = MemoryConfigStore::with_document(sample_config());
        let mut controller = Controller::new(mock, store, RecordingView::new(Configuration::default()));
        controller.open();
        let before = controller.current().clone();

        let err = controller.apply_ui_config().unwrap_err();
        assert!(matches!(err, FanControlError::TransportConnect { .. }));
        assert_eq!(controller.current(), &before);
        assert_eq!(controller.view().rendered.len(), 1);

        assert!(controller.set_manual_speed(2, 1500).is_err());
        assert_eq!(controller.current(), &before);
        assert!(controller.view().dynamic_flags.is_empty());

        assert!(controller.apply_manual_settings(1800, 1600).is_err());
        assert_eq!(controller.current(), &before);
        assert!(controller.view().dynamic_flags.is_empty());
        assert!(controller.view().ui.dynamic_mode);

        assert!(controller.compile_and_load_drivers().is_err());
        assert_eq!(controller.view().errors.len(), 4);
        assert!(controller.view().errors[0].contains("Could not connect to fan control daemon"));
    }

    #[test]
    fn test_set_all_fans_and_max_speed() {
        let (mut controller, daemon, _) = loopback();
        controller.open();

        controller.max_speed().unwrap();

        assert_eq!(
            daemon.sent(),
            vec![
                Command::SetFanSpeed { fan: 1, speed: 2560 },
                Command::SetFanSpeed { fan: 2, speed: 2560 },
                Command::set_dynamic_mode(false),
            ]
        );
        assert!(!controller.current().dynamic_mode);
    }

    #[test]
    fn test_apply_manual_settings() {
        let (mut controller, daemon, _) = loopback();
        let mut ui = sample_config();
        ui.dynamic_mode = true;
        controller.view_mut().ui = ui.clone();
        controller.open();

        controller.apply_manual_settings(1800, 1600).unwrap();

        let mut expected_config = ui;
        expected_config.dynamic_mode = false;
        assert_eq!(
            daemon.sent(),
            vec![
                Command::update_config(expected_config),
                Command::SetFanSpeed { fan: 1, speed: 1800 },
                Command::SetFanSpeed { fan: 2, speed: 1600 },
                Command::set_dynamic_mode(false),
            ]
        );
        assert_eq!(controller.view().dynamic_flags, vec![false]);
    }

    #[test]
    fn test_apply_manual_settings_keeps_dynamic_mode_when_fan_command_fails() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        mock.expect_send()
            .withf(|cmd| matches!(cmd, Command::UpdateConfig { .. }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_send()
            .withf(|cmd| *cmd == Command::SetFanSpeed { fan: 1, speed: 1800 })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(FanControlError::transport("Broken pipe")));

        let mut ui = sample_config();
        ui.dynamic_mode = true;
        let mut controller = Controller::new(mock, MemoryConfigStore::new(), RecordingView::new(ui));
        controller.open();

        assert!(controller.apply_manual_settings(1800, 1600).is_err());
        assert!(controller.current().dynamic_mode);
        assert!(controller.view().ui.dynamic_mode);
        assert!(controller.view().dynamic_flags.is_empty());
        assert_eq!(controller.view().errors.len(), 1);
    }

    #[test]
    fn test_toggle_dynamic_mode_pushes_ui_values() {
        let (mut controller, daemon, _) = loopback();
        controller.open();

        controller.toggle_dynamic_mode(true).unwrap();

        let mut expected_config = sample_config();
        expected_config.dynamic_mode = true;
        assert_eq!(
            daemon.sent(),
            vec![
                Command::set_dynamic_mode(true),
                Command::update_config(expected_config),
            ]
        );
        assert!(controller.current().dynamic_mode);
    }

    #[test]
    fn test_driver_actions_map_to_commands() {
        let (mut controller, daemon, _) = loopback();

        controller.compile_and_load_drivers().unwrap();
        controller.clean_and_unload_drivers().unwrap();
        controller.reload_drivers().unwrap();

        assert_eq!(
            daemon.sent(),
            vec![
                Command::CompileDrivers,
                Command::LoadDrivers,
                Command::CleanCompiledDrivers,
                Command::UnloadDrivers,
                Command::ReloadCompiledDrivers,
            ]
        );
    }

    #[test]
    fn test_compile_failure_skips_load() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|cmd| *cmd == Command::CompileDrivers)
            .times(1)
            .returning(|_| Err(FanControlError::transport("Broken pipe")));
        mock.expect_send()
            .withf(|cmd| *cmd == Command::LoadDrivers)
            .times(0);

        let mut controller = Controller::new(
            mock,
            MemoryConfigStore::new(),
            RecordingView::new(Configuration::default()),
        );
        assert!(controller.compile_and_load_drivers().is_err());
    }

    #[test]
    fn test_queries_decode_replies() {
        let mut mock = MockTransport::new();
        mock.expect_query()
            .withf(|cmd| *cmd == Command::GetTemp)
            .returning(|_| Ok(br#"{"cpu_temp": 72, "gpu_temp": 65}"#.to_vec()));
        mock.expect_query()
            .withf(|cmd| *cmd == Command::GetDriverStatus)
            .returning(|_| Err(connect_error()));

        let mut controller = Controller::new(
            mock,
            MemoryConfigStore::new(),
            RecordingView::new(Configuration::default()),
        );

        let temps = controller.read_temperatures().unwrap();
        assert_eq!(temps.cpu_temp, 72);
        assert_eq!(temps.gpu_temp, 65);

        assert!(controller.driver_status().is_err());
        assert_eq!(controller.view().errors.len(), 1);
    }

    #[test]
    fn test_permissive_curve_is_sent_verbatim() {
        let (mut controller, daemon, _) = loopback();
        let mut inverted = sample_config();
        inverted.min_speed = 2400;
        inverted.max_speed = 700;
        inverted.temp_steps.reverse();
        inverted.temp_steps[0] = TempStep { temperature: 99, speed: 100 };
        controller.view_mut().ui = inverted.clone();

        controller.apply_ui_config().unwrap();
        assert_eq!(daemon.sent(), vec![Command::update_config(inverted.clone())]);
        assert_eq!(controller.current(), &inverted);
    }

    #[test]
    fn test_from_settings_uses_configured_paths() {
        let settings = ClientSettings {
            socket_path: PathBuf::from("/tmp/damfc-test.sock"),
            config_path: PathBuf::from("/tmp/damfc-test/config.json"),
            settle_timeout_ms: 300,
            settle_poll_ms: 20,
            ..ClientSettings::default()
        };
        let controller =
            Controller::from_settings(&settings, RecordingView::new(Configuration::default()));
        assert_eq!(
            controller.transport().socket_path(),
            PathBuf::from("/tmp/damfc-test.sock").as_path()
        );
        assert_eq!(
            controller.store().path(),
            PathBuf::from("/tmp/damfc-test/config.json").as_path()
        );
        assert_eq!(controller.settle.timeout, Duration::from_millis(300));
    }
}
