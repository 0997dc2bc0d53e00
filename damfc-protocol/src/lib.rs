//! Shared wire types for the fan control daemon
//!
//! Every message is a single flat JSON object with a `type` discriminator.
//! The configuration document written to disk and the `config` payload of
//! `update_config` share the same schema.

use damfc_error::{FanControlError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum encoded command size. The daemon reads each command with a single
/// 1024 byte `recv`, anything longer is truncated on its side.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Number of control points in the temperature/speed curve
pub const TEMP_STEP_COUNT: usize = 6;

pub const DEFAULT_MIN_SPEED: i32 = 640;
pub const DEFAULT_MAX_SPEED: i32 = 2560;

/// Canonical curve used when no configuration exists yet
pub const DEFAULT_TEMP_STEPS: [TempStep; TEMP_STEP_COUNT] = [
    TempStep { temperature: 50, speed: 1024 },
    TempStep { temperature: 70, speed: 1536 },
    TempStep { temperature: 80, speed: 2048 },
    TempStep { temperature: 85, speed: 2176 },
    TempStep { temperature: 90, speed: 2304 },
    TempStep { temperature: 95, speed: 2432 },
];

/// Base temperature and stride for synthesized curve points
const BACKFILL_BASE_TEMP: i32 = 50;
const BACKFILL_TEMP_STRIDE: i32 = 10;
/// Synthesized speeds split the min..max range in sevenths
const BACKFILL_SPEED_DIVISOR: i64 = 7;

// ============================================================================
// Configuration document
// ============================================================================

/// One curve control point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempStep {
    /// Degrees Celsius
    pub temperature: i32,
    /// Same raw units as `min_speed`/`max_speed`
    pub speed: i32,
}

/// The persisted fan configuration.
///
/// Fields absent from a document take their default values. A `temp_steps`
/// that is explicitly `null` is read as an empty curve and backfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub min_speed: i32,
    pub max_speed: i32,
    pub dynamic_mode: bool,
    #[serde(deserialize_with = "null_as_empty")]
    pub temp_steps: Vec<TempStep>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<TempStep>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TempStep>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: DEFAULT_MAX_SPEED,
            dynamic_mode: true,
            temp_steps: DEFAULT_TEMP_STEPS.to_vec(),
        }
    }
}

impl Configuration {
    /// Curve point synthesized for a missing `index` (0-based).
    ///
    /// `temperature = 50 + 10*index`,
    /// `speed = min + (index+1)*(max-min)/7` with truncating division.
    pub fn synthesized_step(min_speed: i32, max_speed: i32, index: usize) -> TempStep {
        let i = index as i64;
        let span = max_speed as i64 - min_speed as i64;
        let speed = min_speed as i64 + (i + 1) * span / BACKFILL_SPEED_DIVISOR;
        let temperature = BACKFILL_BASE_TEMP as i64 + BACKFILL_TEMP_STRIDE as i64 * i;
        TempStep {
            temperature: saturate(temperature),
            speed: saturate(speed),
        }
    }

    /// Append synthesized points until the curve has `TEMP_STEP_COUNT` entries.
    /// Returns how many points were added. Existing points are never touched.
    pub fn backfill(&mut self) -> usize {
        let before = self.temp_steps.len();
        while self.temp_steps.len() < TEMP_STEP_COUNT {
            let index = self.temp_steps.len();
            self.temp_steps
                .push(Self::synthesized_step(self.min_speed, self.max_speed, index));
        }
        self.temp_steps.len().saturating_sub(before)
    }

    /// Owned variant of [`Configuration::backfill`]
    pub fn backfilled(mut self) -> Self {
        self.backfill();
        self
    }

    /// Report suspicious values without rejecting them.
    ///
    /// Nothing in the load/save/send path calls this: inverted bounds and
    /// out-of-order curves are accepted as-is. UIs may use it to warn.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.min_speed >= self.max_speed {
            return Err(format!(
                "min_speed ({}) must be below max_speed ({})",
                self.min_speed, self.max_speed
            ));
        }
        if self.temp_steps.len() != TEMP_STEP_COUNT {
            return Err(format!(
                "expected {} temperature steps, found {}",
                TEMP_STEP_COUNT,
                self.temp_steps.len()
            ));
        }
        for (i, pair) in self.temp_steps.windows(2).enumerate() {
            if pair[1].temperature <= pair[0].temperature {
                return Err(format!(
                    "step {} temperature {}°C is not above step {} ({}°C)",
                    i + 2,
                    pair[1].temperature,
                    i + 1,
                    pair[0].temperature
                ));
            }
        }
        Ok(())
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

// ============================================================================
// Commands
// ============================================================================

/// Fans addressable through `set_fan_speed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fan {
    Cpu = 1,
    Gpu = 2,
}

impl Fan {
    pub const ALL: [Fan; 2] = [Fan::Cpu, Fan::Gpu];

    /// Wire id of this fan
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Fan::Cpu),
            2 => Some(Fan::Gpu),
            _ => None,
        }
    }
}

/// Closed set of instructions accepted by the daemon.
///
/// Everything except the two queries is fire-and-forget: the daemon closes
/// the connection without writing anything back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SetFanSpeed { fan: u8, speed: i32 },
    SetDynamicMode {
        #[serde(rename = "toActivate")]
        to_activate: bool,
    },
    UpdateConfig { config: Configuration },
    CompileDrivers,
    LoadDrivers,
    UnloadDrivers,
    CleanCompiledDrivers,
    /// Wire tag keeps the daemon's spelling
    #[serde(rename = "reload_complied_drivers")]
    ReloadCompiledDrivers,
    /// Query: reply is a [`TemperatureReport`]
    GetTemp,
    /// Query: reply is a [`DriverStatus`]
    GetDriverStatus,
}

impl Command {
    pub fn set_fan_speed(fan: Fan, speed: i32) -> Self {
        Command::SetFanSpeed { fan: fan.id(), speed }
    }

    pub fn set_dynamic_mode(to_activate: bool) -> Self {
        Command::SetDynamicMode { to_activate }
    }

    pub fn update_config(config: Configuration) -> Self {
        Command::UpdateConfig { config }
    }

    /// Wire tag of this command
    pub fn type_name(&self) -> &'static str {
        match self {
            Command::SetFanSpeed { .. } => "set_fan_speed",
            Command::SetDynamicMode { .. } => "set_dynamic_mode",
            Command::UpdateConfig { .. } => "update_config",
            Command::CompileDrivers => "compile_drivers",
            Command::LoadDrivers => "load_drivers",
            Command::UnloadDrivers => "unload_drivers",
            Command::CleanCompiledDrivers => "clean_compiled_drivers",
            Command::ReloadCompiledDrivers => "reload_complied_drivers",
            Command::GetTemp => "get_temp",
            Command::GetDriverStatus => "get_driver_status",
        }
    }

    /// True for the commands the daemon answers on the same connection
    pub fn expects_reply(&self) -> bool {
        matches!(self, Command::GetTemp | Command::GetDriverStatus)
    }

    /// Validate command parameters before sending to the daemon.
    ///
    /// Only rejects what the daemon would drop silently. Speeds are clamped
    /// daemon-side and curves are accepted in any order.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Command::SetFanSpeed { fan, .. } => {
                if Fan::from_id(*fan).is_none() {
                    return Err(format!("Invalid fan number {} (must be 1 or 2)", fan));
                }
                Ok(())
            }
            Command::SetDynamicMode { .. }
            | Command::UpdateConfig { .. }
            | Command::CompileDrivers
            | Command::LoadDrivers
            | Command::UnloadDrivers
            | Command::CleanCompiledDrivers
            | Command::ReloadCompiledDrivers
            | Command::GetTemp
            | Command::GetDriverStatus => Ok(()),
        }
    }

    /// Compact JSON encoding, bounded by [`MAX_MESSAGE_SIZE`]
    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| FanControlError::Encoding(e.to_string()))?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(FanControlError::MessageTooLarge {
                size: bytes.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ============================================================================
// Query replies
// ============================================================================

/// Reply to `get_temp`. The daemon reports 0 for sensors it cannot read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureReport {
    pub cpu_temp: i32,
    pub gpu_temp: i32,
}

/// Reply to `get_driver_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverStatus {
    pub is_loaded: bool,
    /// Absolute path of the compiled module, if it has been built
    pub driver_path: Option<String>,
    pub driver_directory_exists: bool,
    pub device_files: DeviceFiles,
}

/// Presence of the `/dev/fanN` nodes exposed by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFiles {
    pub fan1: bool,
    pub fan2: bool,
}

impl DriverStatus {
    /// Driver loaded and both device nodes present
    pub fn is_ready(&self) -> bool {
        self.is_loaded && self.device_files.fan1 && self.device_files.fan2
    }
}
