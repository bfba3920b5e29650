mod common;

use common::{FakePrinter, ScriptedOpener};
use extrudekit_communication::{ConnectionManager, PortId};
use extrudekit_core::{ConnectionError, MessageLog};
use std::sync::Arc;

fn manager(opener: &Arc<ScriptedOpener>, log: &Arc<MessageLog>) -> ConnectionManager {
    ConnectionManager::new(opener.clone()).with_sink(log.clone())
}

#[test]
fn test_first_working_port_wins() {
    let printer = FakePrinter::new();
    let opener = Arc::new(ScriptedOpener::new(printer.clone(), &["/dev/ttyUSB1"]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);

    let session = manager
        .connect(&["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyACM0"], false)
        .unwrap();

    assert_eq!(session.port_id(), "/dev/ttyUSB1");
    assert_eq!(opener.attempts(), vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
    assert!(manager.is_connected());
    assert!(log.contains("Printer connected on /dev/ttyUSB1."));
    assert!(printer.written().is_empty());
}

#[test]
fn test_no_candidates() {
    let opener = Arc::new(ScriptedOpener::new(FakePrinter::new(), &[]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);

    let err = manager.connect::<&str>(&[], false).unwrap_err();

    assert_eq!(err, ConnectionError::NoPortsFound);
    assert!(opener.attempts().is_empty());
    assert!(log.contains("No serial ports found. Please connect your printer."));
}

#[test]
fn test_every_candidate_fails() {
    let opener = Arc::new(ScriptedOpener::new(FakePrinter::new(), &[]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);

    let err = manager.connect(&["COM3", "COM4"], false).unwrap_err();

    match err {
        ConnectionError::AllPortsFailed { attempts } => {
            let ports: Vec<_> = attempts.iter().map(|a| a.port.as_str()).collect();
            assert_eq!(ports, vec!["COM3", "COM4"]);
            assert!(attempts[0].reason.contains("No such file or directory"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!manager.is_connected());
    assert_eq!(
        manager.require_session().unwrap_err(),
        ConnectionError::NotConnected
    );
}

#[test]
fn test_auto_home_sends_g28() {
    let printer = FakePrinter::new();
    let opener = Arc::new(ScriptedOpener::new(printer.clone(), &["COM3"]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);

    manager.connect(&["COM3"], true).unwrap();

    assert_eq!(printer.written(), vec!["G28"]);
    assert_eq!(
        log.texts(),
        vec![
            "Printer connected on COM3.",
            "Sending auto-home command (G28)...",
            "Sent: G28",
            "Auto-home command sent.",
        ]
    );
}

#[test]
fn test_connect_auto_uses_enumerator_order() {
    let opener = Arc::new(ScriptedOpener::new(FakePrinter::new(), &["/dev/ttyACM0"]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);
    let ports: Vec<PortId> = vec!["/dev/ttyACM0".into(), "/dev/ttyUSB0".into()];

    let session = manager.connect_auto(&ports, false).unwrap();

    assert_eq!(session.port_id(), "/dev/ttyACM0");
    assert_eq!(opener.attempts(), vec!["/dev/ttyACM0"]);
}

#[test]
fn test_disconnect_closes_shared_handles() {
    let printer = FakePrinter::new();
    let opener = Arc::new(ScriptedOpener::new(printer.clone(), &["COM3"]));
    let log = MessageLog::shared();
    let mut manager = manager(&opener, &log);
    let session = manager.connect(&["COM3"], false).unwrap();

    assert!(manager.disconnect());
    assert!(!manager.disconnect());
    assert!(!session.is_open());
    assert!(manager.session().is_none());
    assert!(log.contains("Disconnected from COM3."));
}
