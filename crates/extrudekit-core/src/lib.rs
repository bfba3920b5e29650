//! # ExtrudeKit Core
//!
//! Core types shared by every ExtrudeKit crate:
//! - the error taxonomy for connection, protocol and calibration layers
//! - the immutable G-code [`Command`] line
//! - the fire-and-forget [`MessageSink`] used for user-facing trace lines
//! - the [`Clock`] abstraction behind every delay and deadline

pub mod clock;
pub mod command;
pub mod error;
pub mod message;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::Command;
pub use error::{CalibrationError, ConnectionError, Error, PortAttempt, ProtocolError, Result};
pub use message::{Message, MessageLevel, MessageLog, MessageSink, NullSink, SharedSink};
