//! # ExtrudeKit Communication
//!
//! Everything that talks to the printer:
//! - `communication`: the transport seam and its `serialport` implementation
//! - `protocol`: the line-oriented call/response driver and shared session
//! - `connection`: port iteration and session ownership
//! - `firmware::marlin`: command builders, reply parsing and the printer inventory
//! - `calibration`: the extruder steps/mm calibration state machine

pub mod calibration;
pub mod cancel;
pub mod communication;
pub mod connection;
pub mod firmware;
pub mod protocol;

pub use calibration::{
    CalibrationConfig, CalibrationRunner, CalibrationState, CalibrationWorkflow, Measurement,
    Phase, Step,
};
pub use cancel::CancelToken;
pub use communication::{
    serial::{list_ports, SerialOpener, SerialPortInfo, SerialTransport, SystemPortEnumerator},
    LinkParams, PortEnumerator, PortId, Transport, TransportOpener,
};
pub use connection::ConnectionManager;
pub use firmware::marlin::{
    InventoryRecord, InventorySection, PrinterInventory, SectionLabel, TemperatureMonitor,
    TemperatureReport,
};
pub use protocol::{CollectionPolicy, CommandChannel, ProtocolDriver, Response, SharedSession};
