use vehicle_core::error::VehicleCoreError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        VehicleCoreError::config("x"),
        VehicleCoreError::Config { .. }
    ));
    assert!(matches!(
        VehicleCoreError::can("x"),
        VehicleCoreError::Can { .. }
    ));
    assert!(matches!(
        VehicleCoreError::poller("x"),
        VehicleCoreError::Poller { .. }
    ));
    assert!(matches!(
        VehicleCoreError::web("x"),
        VehicleCoreError::Web { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        VehicleCoreError::driver("x"),
        VehicleCoreError::Driver { .. }
    ));
    assert!(matches!(
        VehicleCoreError::validation("f", "m"),
        VehicleCoreError::Validation { .. }
    ));
    assert!(matches!(
        VehicleCoreError::timeout("x"),
        VehicleCoreError::Timeout { .. }
    ));
    assert!(matches!(
        VehicleCoreError::generic("x"),
        VehicleCoreError::Generic { .. }
    ));
}

#[test]
fn display_messages() {
    let e = VehicleCoreError::validation("field", "bad");
    let s = format!("{e}");
    assert!(s.contains("Validation error"));
    assert!(s.contains("field"));
    assert!(s.contains("bad"));
}

#[test]
fn io_error_converts_to_generic() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
    let err: VehicleCoreError = io_err.into();
    assert!(matches!(err, VehicleCoreError::Generic { .. }));
}

#[test]
fn yaml_error_converts_to_config() {
    let yaml_err = serde_yaml::from_str::<vehicle_core::config::Config>("bad: [unterminated")
        .unwrap_err();
    let err: VehicleCoreError = yaml_err.into();
    assert!(matches!(err, VehicleCoreError::Config { .. }));
}
