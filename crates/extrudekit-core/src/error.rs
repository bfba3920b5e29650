//! Error handling for ExtrudeKit
//!
//! Provides error types for each layer of the printer session:
//! - Connection errors (port discovery and opening)
//! - Protocol errors (transport failures during an exchange)
//! - Calibration errors (user input and reply-format problems)
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::fmt;
use thiserror::Error;

/// A single failed attempt to open a candidate port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAttempt {
    /// The port that was tried.
    pub port: String,
    /// Why opening it failed.
    pub reason: String,
}

impl fmt::Display for PortAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.port, self.reason)
    }
}

fn join_attempts(attempts: &[PortAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Connection error type
///
/// Represents errors raised while discovering ports and establishing
/// a session with the printer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The candidate port list was empty
    #[error("No serial ports found. Please connect your printer.")]
    NoPortsFound,

    /// Every candidate port refused the connection
    #[error("Failed to connect to any printer port ({})", join_attempts(.attempts))]
    AllPortsFailed {
        /// One entry per port that was tried, in order.
        attempts: Vec<PortAttempt>,
    },

    /// A single port could not be opened
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// An operation needed a live session but none is open
    #[error("Not connected to a printer.")]
    NotConnected,

    /// The platform refused to enumerate ports
    #[error("Failed to enumerate ports: {reason}")]
    Enumeration {
        /// The reason enumeration failed.
        reason: String,
    },
}

/// Protocol error type
///
/// Carried inside a partial response when an exchange was cut short.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Transport read or write failure
    #[error("I/O error: {reason}")]
    Io {
        /// The underlying transport error.
        reason: String,
    },

    /// No terminal line arrived before the response deadline
    #[error("No terminal reply after {timeout_ms}ms")]
    DeadlineExceeded {
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io {
            reason: e.to_string(),
        }
    }
}

/// Calibration error type
///
/// Raised by the extrusion calibration workflow. The workflow returns to
/// idle on any of these and leaves its recorded state untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// The supplied filament measurements cannot be used
    #[error("Invalid measurement: {reason}")]
    InvalidMeasurement {
        /// Why the measurement was rejected.
        reason: String,
    },

    /// No parsable `T:` reading in the temperature report
    #[error("Failed to read hotend temperature.")]
    TemperatureUnavailable,

    /// No parsable `M92 ... E` line in the settings report
    #[error("Failed to read current extruder steps.")]
    StepsUnavailable,

    /// The session is closed
    #[error("Not connected to a printer.")]
    NotConnected,

    /// The requested operation does not fit the current phase
    #[error("Cannot {requested} while {current}")]
    InvalidPhase {
        /// The current phase name.
        current: String,
        /// The requested operation.
        requested: String,
    },

    /// The hotend did not reach the target before the heating deadline
    #[error("Hotend did not reach temperature within {timeout_ms}ms")]
    HeatingTimedOut {
        /// The heating deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The caller cancelled a running leg
    #[error("Calibration cancelled")]
    Cancelled,

    /// A command could not be written to the printer
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CalibrationError {
    /// Shorthand for [`CalibrationError::InvalidMeasurement`]
    pub fn invalid_measurement(reason: impl Into<String>) -> Self {
        CalibrationError::InvalidMeasurement {
            reason: reason.into(),
        }
    }
}

/// Main error type for ExtrudeKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Calibration error
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a calibration error
    pub fn is_calibration_error(&self) -> bool {
        matches!(self, Error::Calibration(_))
    }

    /// Check if this is a timeout of either kind
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Protocol(ProtocolError::DeadlineExceeded { .. })
                | Error::Calibration(CalibrationError::HeatingTimedOut { .. })
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
