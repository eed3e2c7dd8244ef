use std::fs;
use vehicle_core::config::Config;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.can.interface = "can1".to_string();
    cfg.vehicle.units_distance = "miles".to_string();
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.can.interface, "can1");
    assert_eq!(loaded.vehicle.units_distance, "miles");
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    cfg.can.interface.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.can.queue_capacity = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.poller.interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.tick.period_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.vehicle.alert_12v = 0.0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.vehicle.units_distance = "furlongs".to_string();
    assert!(cfg.validate().is_err());
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"bad: [unclosed").unwrap();
    assert!(Config::from_file(tmp.path()).is_err());
}
