//! Serial port communication implementation
//!
//! Provides the `serialport`-backed transport used for direct USB/UART
//! connections to a printer.
//!
//! Supports:
//! - Port enumeration and discovery
//! - Baud rate and read timeout configuration
//! - Line-buffered reads that survive timeouts mid-line

use super::{LinkParams, PortEnumerator, PortId, Transport, TransportOpener};
use extrudekit_core::ConnectionError;
use serde::Serialize;
use std::io::{self, BufRead, BufReader, Write};

/// Information about an available serial port
#[derive(Debug, Clone, Serialize)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,

    /// Manufacturer name if available
    pub manufacturer: Option<String>,

    /// USB vendor ID if applicable
    pub vid: Option<u16>,

    /// USB product ID if applicable
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Create a new port info
    pub fn new(port_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            description: description.into(),
            manufacturer: None,
            vid: None,
            pid: None,
        }
    }

    /// Set manufacturer
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Set USB IDs
    pub fn with_usb_ids(mut self, vid: u16, pid: u16) -> Self {
        self.vid = Some(vid);
        self.pid = Some(pid);
        self
    }
}

/// List available serial ports on the system
///
/// Filters ports to include only patterns printer boards enumerate as:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>, ConnectionError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ConnectionError::Enumeration {
            reason: e.to_string(),
        }
    })?;

    Ok(ports
        .iter()
        .filter(|port| is_candidate_port(&port.port_name))
        .map(|port| {
            let info = SerialPortInfo::new(&port.port_name, port_description(port));
            match &port.port_type {
                serialport::SerialPortType::UsbPort(usb_info) => {
                    let info = info.with_usb_ids(usb_info.vid, usb_info.pid);
                    match usb_info.manufacturer {
                        Some(ref mfg) => info.with_manufacturer(mfg),
                        None => info,
                    }
                }
                _ => info,
            }
        })
        .collect())
}

/// Check if a port name looks like a printer controller board
pub fn is_candidate_port(port_name: &str) -> bool {
    // Windows COM ports
    if let Some(number) = port_name.strip_prefix("COM") {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }

    // Linux USB and ACM devices
    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    // macOS serial and modem devices
    port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem")
}

/// Get a user-friendly description for a port
fn port_description(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Enumerates ports through the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortEnumerator;

impl PortEnumerator for SystemPortEnumerator {
    fn list_ports(&self) -> Result<Vec<PortId>, ConnectionError> {
        Ok(list_ports()?.into_iter().map(|p| p.port_name).collect())
    }
}

/// Opens [`SerialTransport`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    fn open(&self, port: &str, params: &LinkParams) -> Result<Box<dyn Transport>, ConnectionError> {
        Ok(Box::new(SerialTransport::open(port, params)?))
    }
}

/// Serial port transport using the serialport crate
pub struct SerialTransport {
    port_name: String,
    reader: BufReader<Box<dyn serialport::SerialPort>>,
    // Bytes of a line whose terminator has not arrived yet
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open a serial port with the given parameters
    pub fn open(port: &str, params: &LinkParams) -> Result<Self, ConnectionError> {
        let opened = serialport::new(port, params.baud_rate)
            .timeout(params.read_timeout)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open();

        match opened {
            Ok(handle) => Ok(Self {
                port_name: port.to_string(),
                reader: BufReader::new(handle),
                pending: Vec::new(),
            }),
            Err(e) => {
                tracing::warn!("Failed to open serial port {}: {}", port, e);
                Err(ConnectionError::FailedToOpen {
                    port: port.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    fn take_line(&mut self) -> Vec<u8> {
        let mut line = std::mem::take(&mut self.pending);
        while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
            line.pop();
        }
        line
    }
}

impl Transport for SerialTransport {
    fn port_id(&self) -> &str {
        &self.port_name
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        let port = self.reader.get_mut();
        port.write_all(text.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.reader.read_until(b'\n', &mut self.pending) {
            Ok(_) if self.pending.ends_with(b"\n") => Ok(Some(self.take_line())),
            // EOF or a partial line: keep what we have for the next call
            Ok(_) => Ok(None),
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn has_buffered_data(&mut self) -> io::Result<bool> {
        if self.pending.contains(&b'\n') || !self.reader.buffer().is_empty() {
            return Ok(true);
        }
        let waiting = self.reader.get_ref().bytes_to_read().map_err(io::Error::from)?;
        Ok(waiting > 0)
    }
}
