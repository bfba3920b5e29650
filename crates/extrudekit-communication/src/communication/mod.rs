//! Transport seam
//!
//! The protocol driver never touches a serial port directly. It speaks to a
//! [`Transport`]: a duplex line stream with a per-read timeout. Opening one
//! and discovering candidate ports are separate capabilities so a session can
//! be exercised end to end against an in-memory stream.

pub mod serial;

use extrudekit_core::ConnectionError;
use std::io;
use std::time::Duration;

/// Device identifier, e.g. `/dev/ttyUSB0` or `COM3`
pub type PortId = String;

/// Line parameters used when opening a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Baud rate
    pub baud_rate: u32,
    /// How long a single `read_line` may block
    pub read_timeout: Duration,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            read_timeout: Duration::from_secs(2),
        }
    }
}

/// Duplex line stream to the printer
pub trait Transport: Send {
    /// The port this stream is attached to
    fn port_id(&self) -> &str;

    /// Write `text` followed by a single `\n`
    fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// Read one line without its terminator.
    ///
    /// Blocks up to the read timeout. `Ok(None)` means the timeout elapsed
    /// before a complete line arrived.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Whether a read would return data without waiting
    fn has_buffered_data(&mut self) -> io::Result<bool>;
}

/// Opens transports by port name
pub trait TransportOpener: Send + Sync {
    /// Open `port` with the given line parameters
    fn open(&self, port: &str, params: &LinkParams) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// Lists candidate ports
pub trait PortEnumerator {
    /// Candidate ports in the order they should be tried
    fn list_ports(&self) -> Result<Vec<PortId>, ConnectionError>;
}

impl PortEnumerator for Vec<PortId> {
    fn list_ports(&self) -> Result<Vec<PortId>, ConnectionError> {
        Ok(self.clone())
    }
}
