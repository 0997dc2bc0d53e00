/*
 * Test doubles shared by the controller tests.
 *
 * RecordingView stands in for the window, LoopbackDaemon for the privileged
 * daemon: it records every command and writes received configurations into
 * a shared store the way the daemon writes its config file.
 */

use std::sync::Arc;

use damfc_core::{FanControlError, MemoryConfigStore, Result, Transport};
use damfc_protocol::{Command, Configuration, TempStep};
use parking_lot::Mutex;

use crate::view::ConfigView;

/// Fully populated curve that differs from the defaults in every field
pub fn sample_config() -> Configuration {
    Configuration {
        min_speed: 700,
        max_speed: 2400,
        dynamic_mode: false,
        temp_steps: vec![
            TempStep { temperature: 40, speed: 700 },
            TempStep { temperature: 50, speed: 1000 },
            TempStep { temperature: 60, speed: 1400 },
            TempStep { temperature: 70, speed: 1800 },
            TempStep { temperature: 80, speed: 2100 },
            TempStep { temperature: 90, speed: 2400 },
        ],
    }
}

/// View that remembers everything the controller showed it
#[derive(Debug, Default)]
pub struct RecordingView {
    /// Values the user has entered; returned by `snapshot`
    pub ui: Configuration,
    pub rendered: Vec<Configuration>,
    pub dynamic_flags: Vec<bool>,
    pub errors: Vec<String>,
}

impl RecordingView {
    pub fn new(ui: Configuration) -> Self {
        Self {
            ui,
            ..Self::default()
        }
    }
}

impl ConfigView for RecordingView {
    fn snapshot(&self) -> Configuration {
        self.ui.clone()
    }

    fn render(&mut self, config: &Configuration) {
        self.rendered.push(config.clone());
    }

    fn set_dynamic_mode(&mut self, enabled: bool) {
        self.ui.dynamic_mode = enabled;
        self.dynamic_flags.push(enabled);
    }

    fn show_error(&mut self, error: &FanControlError) {
        self.errors.push(error.to_string());
    }
}

type Rewrite = Box<dyn Fn(Configuration) -> Configuration + Send + Sync>;

/// In-process daemon double
pub struct LoopbackDaemon {
    store: Arc<MemoryConfigStore>,
    sent: Mutex<Vec<Command>>,
    apply_updates: Mutex<bool>,
    rewrite: Mutex<Option<Rewrite>>,
}

impl LoopbackDaemon {
    pub fn new(store: Arc<MemoryConfigStore>) -> Self {
        Self {
            store,
            sent: Mutex::new(Vec::new()),
            apply_updates: Mutex::new(true),
            rewrite: Mutex::new(None),
        }
    }

    /// Commands received so far, in order
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }

    /// When false, update_config is accepted but never persisted
    pub fn set_apply_updates(&self, apply: bool) {
        *self.apply_updates.lock() = apply;
    }

    /// Transform received configurations before persisting them
    pub fn set_rewrite(&self, rewrite: impl Fn(Configuration) -> Configuration + Send + Sync + 'static) {
        *self.rewrite.lock() = Some(Box::new(rewrite));
    }

    fn receive(&self, command: &Command, reply: bool) -> Result<()> {
        if command.expects_reply() != reply {
            return Err(FanControlError::InvalidCommand(command.type_name().into()));
        }
        command.validate().map_err(FanControlError::InvalidCommand)?;
        self.sent.lock().push(command.clone());

        if let Command::UpdateConfig { config } = command {
            if *self.apply_updates.lock() {
                let persisted = match self.rewrite.lock().as_ref() {
                    Some(rewrite) => rewrite(config.clone()),
                    None => config.clone(),
                };
                self.store.replace(Some(persisted));
            }
        }
        Ok(())
    }
}

impl Transport for LoopbackDaemon {
    fn send(&self, command: &Command) -> Result<()> {
        self.receive(command, false)
    }

    fn query(&self, command: &Command) -> Result<Vec<u8>> {
        self.receive(command, true)?;
        let reply = match command {
            Command::GetTemp => r#"{"cpu_temp": 55, "gpu_temp": 48}"#,
            Command::GetDriverStatus => {
                r#"{"is_loaded": true, "driver_path": "/opt/damx/driver", "driver_directory_exists": true, "device_files": {"fan1": true, "fan2": true}}"#
            }
            _ => return Err(FanControlError::DaemonResponse("no reply".into())),
        };
        Ok(reply.as_bytes().to_vec())
    }
}
