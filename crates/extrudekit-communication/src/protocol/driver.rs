//! Protocol driver over a single transport

use super::{is_terminal, CollectionPolicy, CommandChannel, Response};
use crate::communication::Transport;
use extrudekit_core::{Clock, Command, NullSink, ProtocolError, SharedSink, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Sends commands and collects replies on one open transport.
///
/// Read errors never escape: they end collection and come back as
/// [`Response::Partial`]. Once disconnected, sends are no-ops and receives
/// are empty.
pub struct ProtocolDriver {
    transport: Option<Box<dyn Transport>>,
    port_id: String,
    sink: SharedSink,
    clock: Arc<dyn Clock>,
    response_deadline: Option<Duration>,
}

impl ProtocolDriver {
    /// Wrap an open transport
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let port_id = transport.port_id().to_string();
        Self {
            transport: Some(transport),
            port_id,
            sink: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            response_deadline: None,
        }
    }

    /// Report sent commands to `sink`
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Use `clock` for response deadlines
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Give up waiting for a terminal line after `deadline`
    pub fn with_response_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.response_deadline = deadline;
        self
    }

    /// Port the session was opened on, kept after disconnect
    pub fn port_name(&self) -> &str {
        &self.port_id
    }

    /// Drop the transport. Returns false if it was already closed.
    pub fn disconnect(&mut self) -> bool {
        match self.transport.take() {
            Some(_) => {
                tracing::info!("Closed session on {}", self.port_id);
                true
            }
            None => false,
        }
    }

    /// Write `command` plus terminator
    pub fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!("Dropping {} on closed session", command);
            return Ok(());
        };

        transport.write_line(command.as_str()).map_err(|e| {
            tracing::error!("Failed to write {} to {}: {}", command, self.port_id, e);
            ProtocolError::from(e)
        })?;

        tracing::debug!(port = %self.port_id, ">> {}", command);
        self.sink.append_message(&format!("Sent: {}", command));
        Ok(())
    }

    /// Read until a line containing `ok` or `error`.
    ///
    /// Read timeouts without data keep waiting; only the optional response
    /// deadline bounds the loop.
    pub fn receive_until_terminal(&mut self) -> Response {
        let Some(transport) = self.transport.as_mut() else {
            return Response::empty();
        };

        let started = self.clock.now();
        let mut lines = Vec::new();

        loop {
            match transport.read_line() {
                Ok(Some(bytes)) => {
                    if let Some(line) = decode_line(bytes) {
                        if !line.is_empty() {
                            tracing::debug!(port = %self.port_id, "<< {}", line);
                            let terminal = is_terminal(&line);
                            lines.push(line);
                            if terminal {
                                return Response::Complete(lines);
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Error reading from {}: {}", self.port_id, e);
                    return Response::Partial {
                        lines,
                        error: e.into(),
                    };
                }
            }

            if let Some(deadline) = self.response_deadline {
                if self.clock.elapsed(started) >= deadline {
                    tracing::warn!(
                        "No terminal reply from {} within {:?}",
                        self.port_id,
                        deadline
                    );
                    return Response::Partial {
                        lines,
                        error: ProtocolError::DeadlineExceeded {
                            timeout_ms: deadline.as_millis() as u64,
                        },
                    };
                }
            }
        }
    }

    /// Read only what is already buffered
    pub fn receive_available(&mut self) -> Response {
        let Some(transport) = self.transport.as_mut() else {
            return Response::empty();
        };

        let mut lines = Vec::new();
        loop {
            match transport.has_buffered_data() {
                Ok(true) => {}
                Ok(false) => return Response::Complete(lines),
                Err(e) => {
                    tracing::error!("Error polling {}: {}", self.port_id, e);
                    return Response::Partial {
                        lines,
                        error: e.into(),
                    };
                }
            }

            match transport.read_line() {
                Ok(Some(bytes)) => {
                    if let Some(line) = decode_line(bytes) {
                        tracing::debug!(port = %self.port_id, "<< {}", line);
                        lines.push(line);
                    }
                }
                // Buffered bytes without a terminator yet
                Ok(None) => return Response::Complete(lines),
                Err(e) => {
                    tracing::error!("Error reading from {}: {}", self.port_id, e);
                    return Response::Partial {
                        lines,
                        error: e.into(),
                    };
                }
            }
        }
    }
}

impl CommandChannel for ProtocolDriver {
    fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn port_id(&self) -> Option<&str> {
        self.transport.as_ref().map(|_| self.port_id.as_str())
    }

    fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        ProtocolDriver::send(self, command)
    }

    fn receive(&mut self, policy: CollectionPolicy) -> Response {
        match policy {
            CollectionPolicy::UntilTerminal => self.receive_until_terminal(),
            CollectionPolicy::Available => self.receive_available(),
        }
    }
}

fn decode_line(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text.trim().to_string()),
        Err(e) => {
            tracing::warn!("Dropping undecodable reply line: {}", e);
            None
        }
    }
}
