//! Error types for the settings crate.
//!
//! This module provides structured error types for loading, saving and
//! validating the tracker configuration.

use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be loaded.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// The configuration file could not be saved.
    #[error("Failed to save settings: {0}")]
    SaveError(String),

    /// A configuration value is invalid.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The file extension does not name a supported format.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl SettingsError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<SettingsError> for motionminder_core::Error {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::IoError(io) => motionminder_core::Error::Io(io),
            other => motionminder_core::Error::other(other.to_string()),
        }
    }
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::LoadError("file not found".to_string());
        assert_eq!(err.to_string(), "Failed to load settings: file not found");

        let err = SettingsError::invalid("tracking.update_interval", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid setting 'tracking.update_interval': must be > 0"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let settings_err: SettingsError = io_err.into();
        assert!(matches!(settings_err, SettingsError::IoError(_)));

        let core_err: motionminder_core::Error = settings_err.into();
        assert!(matches!(core_err, motionminder_core::Error::Io(_)));

        let core_err: motionminder_core::Error =
            SettingsError::UnsupportedFormat("yaml".to_string()).into();
        assert_eq!(core_err.to_string(), "Unsupported config format: yaml");
    }
}
