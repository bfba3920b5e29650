//! In-memory printer used by the integration tests
#![allow(dead_code)]

use extrudekit_communication::{
    LinkParams, ProtocolDriver, SharedSession, Transport, TransportOpener,
};
use extrudekit_core::{Clock, ConnectionError, ManualClock, SharedSink};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One item waiting to be read
#[derive(Debug, Clone)]
pub enum Incoming {
    Line(Vec<u8>),
    Fail(io::ErrorKind),
    /// Bytes of a line whose terminator never arrives
    Unterminated(Vec<u8>),
}

#[derive(Default)]
struct Wire {
    written: Vec<String>,
    inbox: VecDeque<Incoming>,
    in_flight: VecDeque<(Instant, Incoming)>,
    replies: HashMap<String, VecDeque<Vec<Incoming>>>,
    clock: Option<Arc<ManualClock>>,
    read_timeout: Duration,
    latency: Duration,
}

impl Wire {
    /// Move replies whose latency has passed into the inbox
    fn land(&mut self) {
        let Some(clock) = &self.clock else {
            return;
        };
        let now = clock.now();
        while self.in_flight.front().is_some_and(|(ready, _)| *ready <= now) {
            if let Some((_, item)) = self.in_flight.pop_front() {
                self.inbox.push_back(item);
            }
        }
    }

    /// Block like a serial read: until the next reply lands or the read
    /// timeout passes
    fn wait(&mut self) {
        let Some(clock) = self.clock.clone() else {
            return;
        };
        let wait = match self.in_flight.front() {
            Some((ready, _)) => ready
                .saturating_duration_since(clock.now())
                .min(self.read_timeout),
            None => self.read_timeout,
        };
        clock.advance(wait);
        self.land();
    }
}

/// Scripted printer.
///
/// Each written command queues the next scripted reply for its first word
/// (`M105`, `G1`, ...). The last reply for a word repeats; unscripted words
/// answer `ok`. Reads with nothing queued time out, advancing the manual
/// clock by the read timeout when one is attached.
///
/// With a latency, replies only become readable once the manual clock has
/// moved that far past the write.
#[derive(Clone, Default)]
pub struct FakePrinter {
    wire: Arc<Mutex<Wire>>,
}

impl FakePrinter {
    pub fn new() -> Self {
        let printer = Self::default();
        printer.wire.lock().read_timeout = Duration::from_secs(2);
        printer
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        let printer = Self::new();
        printer.wire.lock().clock = Some(clock);
        printer
    }

    /// Printer that answers `latency` after each command
    pub fn with_latency(clock: Arc<ManualClock>, latency: Duration) -> Self {
        let printer = Self::with_clock(clock);
        printer.wire.lock().latency = latency;
        printer
    }

    /// Queue a reply to the next `word` command
    pub fn respond(&self, word: &str, lines: &[&str]) -> &Self {
        let reply = lines
            .iter()
            .map(|line| Incoming::Line(line.as_bytes().to_vec()))
            .collect();
        self.respond_raw(word, reply)
    }

    pub fn respond_raw(&self, word: &str, reply: Vec<Incoming>) -> &Self {
        self.wire
            .lock()
            .replies
            .entry(word.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Put a line on the wire without any command
    pub fn push_line(&self, line: &str) {
        self.push_bytes(line.as_bytes());
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.wire
            .lock()
            .inbox
            .push_back(Incoming::Line(bytes.to_vec()));
    }

    /// Put bytes on the wire that never complete a line
    pub fn push_unterminated(&self, bytes: &[u8]) {
        self.wire
            .lock()
            .inbox
            .push_back(Incoming::Unterminated(bytes.to_vec()));
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        self.wire.lock().inbox.push_back(Incoming::Fail(kind));
    }

    /// Commands written so far
    pub fn written(&self) -> Vec<String> {
        self.wire.lock().written.clone()
    }

    /// Lines still waiting to be read
    pub fn unread(&self) -> usize {
        self.wire.lock().inbox.len()
    }

    pub fn transport(&self, port: &str) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            port: port.to_string(),
            wire: self.wire.clone(),
            fail_writes: false,
        })
    }

    pub fn broken_transport(&self, port: &str) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            port: port.to_string(),
            wire: self.wire.clone(),
            fail_writes: true,
        })
    }

    /// Open session on this printer using `clock` for deadlines
    pub fn session(&self, clock: Arc<ManualClock>, sink: SharedSink) -> SharedSession {
        SharedSession::new(
            ProtocolDriver::new(self.transport("/dev/ttyUSB0"))
                .with_clock(clock)
                .with_sink(sink),
        )
    }
}

struct FakeTransport {
    port: String,
    wire: Arc<Mutex<Wire>>,
    fail_writes: bool,
}

impl Transport for FakeTransport {
    fn port_id(&self) -> &str {
        &self.port
    }

    fn write_line(&mut self, text: &str) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }

        let mut wire = self.wire.lock();
        wire.written.push(text.to_string());

        let word = text.split_whitespace().next().unwrap_or_default().to_string();
        let reply = match wire.replies.get_mut(&word) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let reply = reply.unwrap_or_else(|| vec![Incoming::Line(b"ok".to_vec())]);

        let latency = wire.latency;
        match wire.clock.clone() {
            Some(clock) if !latency.is_zero() => {
                let ready = clock.now() + latency;
                wire.in_flight
                    .extend(reply.into_iter().map(|item| (ready, item)));
            }
            _ => wire.inbox.extend(reply),
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut wire = self.wire.lock();
        wire.land();
        if matches!(wire.inbox.front(), None | Some(Incoming::Unterminated(_))) {
            wire.wait();
        }
        match wire.inbox.front() {
            Some(Incoming::Unterminated(_)) | None => return Ok(None),
            Some(_) => {}
        }
        match wire.inbox.pop_front() {
            Some(Incoming::Line(bytes)) => Ok(Some(bytes)),
            Some(Incoming::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            Some(Incoming::Unterminated(_)) | None => Ok(None),
        }
    }

    fn has_buffered_data(&mut self) -> io::Result<bool> {
        let mut wire = self.wire.lock();
        wire.land();
        Ok(!wire.inbox.is_empty())
    }
}

/// Opener that only succeeds for the listed ports and records every attempt
pub struct ScriptedOpener {
    printer: FakePrinter,
    working: Vec<String>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedOpener {
    pub fn new(printer: FakePrinter, working: &[&str]) -> Self {
        Self {
            printer,
            working: working.iter().map(|p| p.to_string()).collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

impl TransportOpener for ScriptedOpener {
    fn open(&self, port: &str, _params: &LinkParams) -> Result<Box<dyn Transport>, ConnectionError> {
        self.attempts.lock().push(port.to_string());
        if self.working.iter().any(|p| p == port) {
            Ok(self.printer.transport(port))
        } else {
            Err(ConnectionError::FailedToOpen {
                port: port.to_string(),
                reason: "No such file or directory".to_string(),
            })
        }
    }
}
