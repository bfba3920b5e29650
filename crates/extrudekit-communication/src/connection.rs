//! Connection management
//!
//! Tries candidate ports in order and keeps the first session that opens.

use crate::communication::{LinkParams, PortEnumerator, TransportOpener};
use crate::firmware::marlin::commands;
use crate::protocol::{ProtocolDriver, SharedSession};
use extrudekit_core::{Clock, ConnectionError, NullSink, PortAttempt, SharedSink, SystemClock};
use std::sync::Arc;
use std::time::Duration;

/// Owns the live session.
///
/// Other components borrow the session through [`SharedSession`] for the
/// length of one exchange; only the manager opens or closes it.
pub struct ConnectionManager {
    opener: Arc<dyn TransportOpener>,
    params: LinkParams,
    sink: SharedSink,
    clock: Arc<dyn Clock>,
    response_deadline: Option<Duration>,
    session: Option<SharedSession>,
}

impl ConnectionManager {
    /// Create a manager that opens ports with `opener`
    pub fn new(opener: Arc<dyn TransportOpener>) -> Self {
        Self {
            opener,
            params: LinkParams::default(),
            sink: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            response_deadline: None,
            session: None,
        }
    }

    /// Baud rate and read timeout for new sessions
    pub fn with_params(mut self, params: LinkParams) -> Self {
        self.params = params;
        self
    }

    /// Message sink handed to new sessions
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Clock handed to new sessions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Terminal-reply deadline for new sessions
    pub fn with_response_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.response_deadline = deadline;
        self
    }

    /// Open the first candidate that accepts a connection.
    ///
    /// Later candidates are never tried once one succeeds. With `auto_home`
    /// a `G28` is sent right away; its outcome is only logged.
    pub fn connect<S: AsRef<str>>(
        &mut self,
        candidates: &[S],
        auto_home: bool,
    ) -> Result<SharedSession, ConnectionError> {
        if candidates.is_empty() {
            self.sink
                .append_status(&ConnectionError::NoPortsFound.to_string(), true);
            return Err(ConnectionError::NoPortsFound);
        }

        self.disconnect();

        let mut attempts = Vec::new();
        for port in candidates.iter().map(AsRef::<str>::as_ref) {
            tracing::info!("Attempting to connect to {}...", port);
            match self.opener.open(port, &self.params) {
                Ok(transport) => {
                    let driver = ProtocolDriver::new(transport)
                        .with_sink(self.sink.clone())
                        .with_clock(self.clock.clone())
                        .with_response_deadline(self.response_deadline);
                    let session = SharedSession::new(driver);

                    tracing::info!("Connected to {} at {} baud", port, self.params.baud_rate);
                    self.sink
                        .append_status(&format!("Printer connected on {}.", port), false);

                    if auto_home {
                        self.home(&session);
                    }

                    self.session = Some(session.clone());
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", port, e);
                    attempts.push(PortAttempt {
                        port: port.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let err = ConnectionError::AllPortsFailed { attempts };
        self.sink.append_status(&err.to_string(), true);
        Err(err)
    }

    /// Ask `enumerator` for candidates, then [`connect`](Self::connect)
    pub fn connect_auto(
        &mut self,
        enumerator: &dyn PortEnumerator,
        auto_home: bool,
    ) -> Result<SharedSession, ConnectionError> {
        let ports = enumerator.list_ports()?;
        self.connect(&ports, auto_home)
    }

    fn home(&self, session: &SharedSession) {
        self.sink.append_message("Sending auto-home command (G28)...");
        match session.exchange(|driver| driver.send(&commands::home_all())) {
            Ok(()) => self.sink.append_message("Auto-home command sent."),
            Err(e) => tracing::warn!("Auto-home on {} failed: {}", session.port_id(), e),
        }
    }

    /// The live session, if any
    pub fn session(&self) -> Option<SharedSession> {
        self.session.clone()
    }

    /// The live session or [`ConnectionError::NotConnected`]
    pub fn require_session(&self) -> Result<SharedSession, ConnectionError> {
        self.session().ok_or(ConnectionError::NotConnected)
    }

    /// Whether a session is open
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(SharedSession::is_open)
    }

    /// Close the live session. Returns false if there was none.
    pub fn disconnect(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.disconnect();
                self.sink
                    .append_status(&format!("Disconnected from {}.", session.port_id()), false);
                true
            }
            None => false,
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.disconnect();
        }
    }
}
