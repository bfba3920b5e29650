//! Line-oriented G-code call/response protocol
//!
//! A command goes out as one line; the printer answers with zero or more
//! lines. A reply is over when a line contains `ok` or `error`
//! (case-insensitive), or, for the drain policy, when nothing more is
//! buffered.

mod driver;
mod session;

pub use driver::ProtocolDriver;
pub use session::SharedSession;

use extrudekit_core::{Command, ProtocolError};

/// How reply lines are collected after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionPolicy {
    /// Block until a terminal line arrives
    #[default]
    UntilTerminal,
    /// Take only what is already buffered and return immediately
    Available,
}

/// Whether a reply line ends the response
pub fn is_terminal(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("ok") || lower.contains("error")
}

/// Lines collected for one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Collection finished normally
    Complete(Vec<String>),
    /// The transport failed mid-collection; `lines` is what arrived first
    Partial {
        /// Lines read before the failure
        lines: Vec<String>,
        /// The failure that cut collection short
        error: ProtocolError,
    },
}

impl Response {
    /// Response with no lines
    pub fn empty() -> Self {
        Response::Complete(Vec::new())
    }

    /// Collected lines, whatever the outcome
    pub fn lines(&self) -> &[String] {
        match self {
            Response::Complete(lines) | Response::Partial { lines, .. } => lines,
        }
    }

    /// Consume into the collected lines
    pub fn into_lines(self) -> Vec<String> {
        match self {
            Response::Complete(lines) | Response::Partial { lines, .. } => lines,
        }
    }

    /// Whether collection finished without a transport failure
    pub fn is_complete(&self) -> bool {
        matches!(self, Response::Complete(_))
    }

    /// The failure for a partial response
    pub fn error(&self) -> Option<&ProtocolError> {
        match self {
            Response::Complete(_) => None,
            Response::Partial { error, .. } => Some(error),
        }
    }

    /// Whether the last line is terminal
    pub fn ends_terminal(&self) -> bool {
        self.lines().last().is_some_and(|l| is_terminal(l))
    }
}

/// Capability to exchange commands with a printer.
///
/// Inventory and calibration only ever see this trait.
pub trait CommandChannel: Send {
    /// Whether a stream is attached
    fn is_open(&self) -> bool;

    /// Port of the attached stream
    fn port_id(&self) -> Option<&str>;

    /// Write one command line. A closed channel silently does nothing.
    fn send(&mut self, command: &Command) -> Result<(), ProtocolError>;

    /// Collect a reply with the given policy
    fn receive(&mut self, policy: CollectionPolicy) -> Response;

    /// Send then receive. A failed write yields an empty partial response.
    fn call(&mut self, command: &Command, policy: CollectionPolicy) -> Response {
        match self.send(command) {
            Ok(()) => self.receive(policy),
            Err(error) => Response::Partial {
                lines: Vec::new(),
                error,
            },
        }
    }
}
