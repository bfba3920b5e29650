use extrudekit_settings::{Config, ReplyCollection, SettingsError};
use tempfile::tempdir;

#[test]
fn test_toml_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.connection.preferred_ports = vec!["/dev/ttyUSB1".to_string()];
    config.connection.response_deadline_ms = Some(30_000);
    config.calibration.target_temp_c = 215.0;
    config.calibration.collection = ReplyCollection::UntilTerminal;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.calibration.heating_timeout_ms = 0;
    config.calibration.reply_settle_ms = 250;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.calibration.heating_timeout(), None);
    assert_eq!(loaded.calibration.reply_settle_ms, 250);
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection]\nbaud_rate = 0\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { .. }));
}

#[test]
fn test_malformed_toml_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::TomlError(_)));
}

#[test]
fn test_toml_without_heating_deadline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[calibration]\nheating_timeout_ms = 0\n").unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.calibration.heating_timeout(), None);
    assert_eq!(config.calibration.target_temp_c, 210.0);
}
