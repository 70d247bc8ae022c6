//! Motion Minder Settings Crate
//!
//! Handles tracker configuration: storage location, sampling window,
//! G-code history location and operator defaults.

pub mod config;
pub mod error;

pub use config::{
    Config, DisplaySettings, HistorySettings, StorageSettings, TrackingSettings, STORE_FILE_NAME,
};
pub use error::{SettingsError, SettingsResult};
