//! Configuration for Motion Minder
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats, selected by file extension.
//!
//! Configuration is organized into logical sections:
//! - Storage (where the odometer snapshot lives)
//! - Tracking (accumulation window, homing filter)
//! - History (archived G-code location)
//! - Display (default operator unit)

use crate::error::{SettingsError, SettingsResult};
pub use motionminder_core::units::DistanceUnit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the odometer snapshot inside the data directory
pub const STORE_FILE_NAME: &str = "odometer.json";

/// Odometer storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the odometer snapshot file
    pub path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: base.join("motionminder").join(STORE_FILE_NAME),
        }
    }
}

/// Motion tracking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Contributing samples per accumulation window before flushing to the store
    pub update_interval: u32,
    /// Only count idle travel on axes the host reports as homed
    pub homed_axes_only: bool,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            update_interval: 20,
            homed_axes_only: true,
        }
    }
}

/// G-code history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Directory of archived G-code files; history processing is unavailable without it
    pub gcode_directory: Option<PathBuf>,
    /// Moonraker job history dump; when set, only its jobs are replayed
    pub job_list: Option<PathBuf>,
    /// File extensions treated as G-code (without the dot, case-insensitive)
    pub extensions: Vec<String>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            gcode_directory: None,
            job_list: None,
            extensions: vec!["gcode".to_string(), "gco".to_string(), "g".to_string()],
        }
    }
}

/// Operator display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DisplaySettings {
    /// Unit assumed by SET commands when `UNIT` is omitted
    #[serde(default)]
    pub default_unit: DistanceUnit,
}

/// Complete tracker configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Tracking settings
    #[serde(default)]
    pub tracking: TrackingSettings,
    /// History settings
    #[serde(default)]
    pub history: HistorySettings,
    /// Display settings
    #[serde(default)]
    pub display: DisplaySettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|e| {
            SettingsError::SaveError(format!("{}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.storage.path.as_os_str().is_empty() {
            return Err(SettingsError::invalid("storage.path", "must not be empty"));
        }

        if self.tracking.update_interval == 0 {
            return Err(SettingsError::invalid(
                "tracking.update_interval",
                "must be > 0",
            ));
        }

        if self.history.job_list.is_some() && self.history.gcode_directory.is_none() {
            return Err(SettingsError::invalid(
                "history.job_list",
                "requires history.gcode_directory to resolve job file names",
            ));
        }

        if self.history.extensions.is_empty() {
            return Err(SettingsError::invalid(
                "history.extensions",
                "at least one extension is required",
            ));
        }

        if let Some(ext) = self
            .history
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(SettingsError::invalid(
                "history.extensions",
                format!("'{}' must be a bare extension such as gcode", ext),
            ));
        }

        Ok(())
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
