use motionminder_core::DistanceUnit;
use motionminder_settings::{Config, SettingsError};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motionminder.json");

    let mut config = Config::new();
    config.storage.path = dir.path().join("odometer.json");
    config.tracking.update_interval = 5;
    config.history.gcode_directory = Some(PathBuf::from("/home/pi/printer_data/gcodes"));
    config.display.default_unit = DistanceUnit::Meters;

    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motionminder.toml");
    std::fs::write(
        &path,
        r#"
[storage]
path = "/var/lib/motionminder/odometer.json"

[tracking]
update_interval = 10

[display]
default_unit = "mm"
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.tracking.update_interval, 10);
    assert!(config.tracking.homed_axes_only);
    assert_eq!(config.display.default_unit, DistanceUnit::Millimeters);
    assert_eq!(config.history.extensions, vec!["gcode", "gco", "g"]);
    assert!(config.history.gcode_directory.is_none());
}

#[test]
fn test_toml_history_job_list() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motionminder.toml");
    std::fs::write(
        &path,
        r#"
[history]
gcode_directory = "/home/pi/printer_data/gcodes"
job_list = "/home/pi/printer_data/history.json"
"#,
    )
    .unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(
        config.history.job_list,
        Some(PathBuf::from("/home/pi/printer_data/history.json"))
    );
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("motionminder.toml");
    std::fs::write(&path, "[tracking]\nupdate_interval = 0\n").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { .. })
    ));
}

#[test]
fn test_missing_file_is_load_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SettingsError::LoadError(_)));
}

#[test]
fn test_load_or_default_without_path() {
    let config = Config::load_or_default(None).unwrap();
    assert_eq!(config, Config::default());
}
