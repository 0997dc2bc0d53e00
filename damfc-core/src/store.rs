//! Configuration persistence
//!
//! The configuration document lives at a single well-known path shared with
//! the daemon. Loading never fails outward: a missing or malformed document
//! is replaced by the defaults. Every value handed out has exactly
//! `TEMP_STEP_COUNT` curve points.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use damfc_error::{FanControlError, Result};
use damfc_protocol::Configuration;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::constants::{limits, paths};

/// Result of [`ConfigStore::load`]
#[derive(Debug)]
pub struct Loaded {
    /// Always backfilled
    pub config: Configuration,
    /// Why the defaults were substituted, if they were
    pub fallback: Option<FanControlError>,
}

impl Loaded {
    pub fn is_default(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn into_config(self) -> Configuration {
        self.config
    }
}

/// Durable load/save of the configuration document
pub trait ConfigStore {
    /// Read the backing store. There is no cache: `force_refresh` is accepted
    /// for callers that want to say so, every call reads fresh.
    fn load(&self, force_refresh: bool) -> Loaded;

    /// Backfill a copy of `config` and persist it
    fn save(&self, config: &Configuration) -> Result<()>;
}

impl<S: ConfigStore + ?Sized> ConfigStore for Arc<S> {
    fn load(&self, force_refresh: bool) -> Loaded {
        (**self).load(force_refresh)
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        (**self).save(config)
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// JSON document on disk, written atomically (temp file + rename)
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new(paths::CONFIG_PATH)
    }
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the document; temp files are created here so the
    /// final rename never crosses filesystems
    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn read(&self) -> Result<Configuration> {
        let meta = fs::metadata(&self.path)
            .map_err(|e| FanControlError::config_read(&self.path, e.to_string()))?;

        if meta.len() > limits::MAX_CONFIG_FILE_SIZE {
            return Err(FanControlError::config_read(
                &self.path,
                format!(
                    "file is {} bytes (max {})",
                    meta.len(),
                    limits::MAX_CONFIG_FILE_SIZE
                ),
            ));
        }

        let data = fs::read(&self.path)
            .map_err(|e| FanControlError::config_read(&self.path, e.to_string()))?;

        serde_json::from_slice(&data)
            .map_err(|e| FanControlError::config_read(&self.path, format!("invalid JSON: {}", e)))
    }

    fn write(&self, config: &Configuration) -> io::Result<()> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Each save gets its own temp file, so concurrent writers never
        // rename each other's partial document into place. An unpersisted
        // temp file is removed on drop.
        let mut file = tempfile::Builder::new()
            .prefix(&self.temp_prefix())
            .suffix(paths::TEMP_SUFFIX)
            .tempfile_in(parent)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// `.config.json.` for `config.json`, keeping temp files recognisable
    fn temp_prefix(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(".{}.", name)
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self, force_refresh: bool) -> Loaded {
        debug!(path = %self.path.display(), force_refresh, "Loading configuration");

        let (mut config, fallback) = match self.read() {
            Ok(config) => (config, None),
            Err(e) => {
                warn!("{}; using default configuration", e);
                (Configuration::default(), Some(e))
            }
        };

        let added = config.backfill();
        if added > 0 {
            debug!("Backfilled {} missing temperature steps", added);
        }

        Loaded { config, fallback }
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        let config = config.clone().backfilled();
        match self.write(&config) {
            Ok(()) => {
                info!("Saved configuration to {}", self.path.display());
                Ok(())
            }
            Err(source) => {
                error!("Failed to save configuration to {}: {}", self.path.display(), source);
                Err(FanControlError::ConfigWrite {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-memory stand-in for the configuration file.
/// `None` behaves like a missing file.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    document: Mutex<Option<Configuration>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `config` exactly as given (no backfill)
    pub fn with_document(config: Configuration) -> Self {
        Self {
            document: Mutex::new(Some(config)),
        }
    }

    /// Raw stored document
    pub fn document(&self) -> Option<Configuration> {
        self.document.lock().clone()
    }

    /// Overwrite the stored document without backfilling, as the daemon would
    pub fn replace(&self, config: Option<Configuration>) {
        *self.document.lock() = config;
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, _force_refresh: bool) -> Loaded {
        match self.document() {
            Some(config) => Loaded {
                config: config.backfilled(),
                fallback: None,
            },
            None => Loaded {
                config: Configuration::default().backfilled(),
                fallback: Some(FanControlError::config_read("<memory>", "no document stored")),
            },
        }
    }

    fn save(&self, config: &Configuration) -> Result<()> {
        *self.document.lock() = Some(config.clone().backfilled());
        Ok(())
    }
}
