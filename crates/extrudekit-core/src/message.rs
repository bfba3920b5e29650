//! User-facing message log
//!
//! The session reports what it does ("Sent: M105", "Printer connected on
//! /dev/ttyUSB0.") to a [`MessageSink`]. Sinks are fire-and-forget: the core
//! never blocks on them and never inspects a result.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Severity of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    /// Plain trace line
    Info,
    /// Status change worth highlighting
    Status,
    /// Something went wrong
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Status => write!(f, "STATUS"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A timestamped message line
#[derive(Debug, Clone)]
pub struct Message {
    /// Severity
    pub level: MessageLevel,
    /// Message text
    pub text: String,
    /// When the message was appended
    pub timestamp: DateTime<Local>,
}

impl Message {
    /// Create a message stamped with the current local time
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.text
        )
    }
}

/// Destination for human-readable trace lines
pub trait MessageSink: Send + Sync {
    /// Record a message with an explicit level
    fn append(&self, level: MessageLevel, text: &str);

    /// Record a plain trace line
    fn append_message(&self, text: &str) {
        self.append(MessageLevel::Info, text);
    }

    /// Record a status line; `error` marks it as a failure
    fn append_status(&self, text: &str, error: bool) {
        let level = if error {
            MessageLevel::Error
        } else {
            MessageLevel::Status
        };
        self.append(level, text);
    }
}

/// Shared handle to a sink
pub type SharedSink = Arc<dyn MessageSink>;

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn append(&self, _level: MessageLevel, _text: &str) {}
}

/// In-memory message history, mirrored to `tracing`
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log behind an `Arc`, ready to hand out as a [`SharedSink`]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Snapshot of every message so far
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Texts only, in order
    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().iter().map(|m| m.text.clone()).collect()
    }

    /// Whether any message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.lock().iter().any(|m| m.text.contains(needle))
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Drop all messages
    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl MessageSink for MessageLog {
    fn append(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Error => tracing::warn!(target: "extrudekit::messages", "{}", text),
            _ => tracing::info!(target: "extrudekit::messages", "{}", text),
        }
        self.messages.lock().push(Message::new(level, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_keeps_order() {
        let log = MessageLog::new();
        log.append_message("Sent: M105");
        log.append_status("Hotend reached 210°C.", false);
        log.append_status("Error: No printer connected.", true);

        assert_eq!(
            log.texts(),
            vec![
                "Sent: M105",
                "Hotend reached 210°C.",
                "Error: No printer connected."
            ]
        );
        let levels: Vec<_> = log.messages().iter().map(|m| m.level).collect();
        assert_eq!(
            levels,
            vec![MessageLevel::Info, MessageLevel::Status, MessageLevel::Error]
        );
    }

    #[test]
    fn test_log_clear() {
        let log = MessageLog::new();
        log.append_message("one");
        assert!(log.contains("one"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_null_sink_is_silent() {
        let sink: SharedSink = Arc::new(NullSink);
        sink.append_message("ignored");
    }
}
