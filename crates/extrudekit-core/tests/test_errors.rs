use extrudekit_core::{CalibrationError, ConnectionError, Error, PortAttempt, ProtocolError};

#[test]
fn test_all_ports_failed_lists_attempts() {
    let err = ConnectionError::AllPortsFailed {
        attempts: vec![
            PortAttempt {
                port: "/dev/ttyUSB0".to_string(),
                reason: "busy".to_string(),
            },
            PortAttempt {
                port: "/dev/ttyACM0".to_string(),
                reason: "permission denied".to_string(),
            },
        ],
    };
    let text = err.to_string();
    assert!(text.starts_with("Failed to connect to any printer port"));
    assert!(text.contains("/dev/ttyUSB0: busy"));
    assert!(text.contains("/dev/ttyACM0: permission denied"));
}

#[test]
fn test_unified_error_classification() {
    let err: Error = ConnectionError::NoPortsFound.into();
    assert!(err.is_connection_error());
    assert!(!err.is_calibration_error());

    let err: Error = CalibrationError::HeatingTimedOut { timeout_ms: 1000 }.into();
    assert!(err.is_calibration_error());
    assert!(err.is_timeout());

    let err: Error = ProtocolError::DeadlineExceeded { timeout_ms: 50 }.into();
    assert!(err.is_timeout());
}

#[test]
fn test_protocol_error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "cable pulled");
    let err = ProtocolError::from(io);
    assert_eq!(
        err,
        ProtocolError::Io {
            reason: "cable pulled".to_string()
        }
    );
}

#[test]
fn test_calibration_messages() {
    assert_eq!(
        CalibrationError::StepsUnavailable.to_string(),
        "Failed to read current extruder steps."
    );
    assert_eq!(
        CalibrationError::invalid_measurement("You must extrude at least 10mm.").to_string(),
        "Invalid measurement: You must extrude at least 10mm."
    );
}
