//! Printer Inventory
//!
//! Runs a fixed battery of informational queries and turns each reply into
//! an ordered list of key/value pairs.

use super::response_parser::parse_key_value;
use crate::protocol::{CollectionPolicy, CommandChannel, Response};
use extrudekit_core::{Clock, Command, ConnectionError, NullSink, SharedSink, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Labels of the inventory sections, in query order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionLabel {
    /// `M115`
    #[serde(rename = "Firmware Info")]
    FirmwareInfo,
    /// `M503`
    #[serde(rename = "Current Settings")]
    CurrentSettings,
    /// `M114`
    #[serde(rename = "Position")]
    Position,
    /// `M119`
    #[serde(rename = "Endstop Status")]
    EndstopStatus,
}

impl SectionLabel {
    /// Every section in the order it is queried
    pub const ALL: [SectionLabel; 4] = [
        SectionLabel::FirmwareInfo,
        SectionLabel::CurrentSettings,
        SectionLabel::Position,
        SectionLabel::EndstopStatus,
    ];

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Self::FirmwareInfo => "Firmware Info",
            Self::CurrentSettings => "Current Settings",
            Self::Position => "Position",
            Self::EndstopStatus => "Endstop Status",
        }
    }

    /// Query that fills the section
    pub fn command(&self) -> Command {
        Command::new(match self {
            Self::FirmwareInfo => super::commands::FIRMWARE_INFO,
            Self::CurrentSettings => super::commands::REPORT_SETTINGS,
            Self::Position => super::commands::REPORT_POSITION,
            Self::EndstopStatus => super::commands::ENDSTOP_STATUS,
        })
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One query and what came back for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySection {
    /// Section label
    pub label: SectionLabel,
    /// Command that was sent
    pub command: String,
    /// Parsed reply lines, in arrival order
    pub entries: Vec<(String, String)>,
    /// Why the reply is incomplete, if it is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InventorySection {
    fn new(label: SectionLabel) -> Self {
        Self {
            label,
            command: label.command().to_string(),
            entries: Vec::new(),
            error: None,
        }
    }

    /// Whether the full reply arrived
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Value of the first entry with `key`
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Result of one refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Sections in query order
    pub sections: Vec<InventorySection>,
}

impl InventoryRecord {
    /// Section by label
    pub fn get(&self, label: SectionLabel) -> Option<&InventorySection> {
        self.sections.iter().find(|s| s.label == label)
    }

    /// Whether every section got its full reply
    pub fn is_complete(&self) -> bool {
        self.sections.iter().all(InventorySection::is_complete)
    }

    /// Pretty JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for InventoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "{} ({})", section.label, section.command)?;
            for (key, value) in &section.entries {
                if value.is_empty() {
                    writeln!(f, "  {}", key)?;
                } else {
                    writeln!(f, "  {}: {}", key, value)?;
                }
            }
            if let Some(error) = &section.error {
                writeln!(f, "  (incomplete: {})", error)?;
            }
        }
        Ok(())
    }
}

/// Collects the printer inventory over a [`CommandChannel`]
pub struct PrinterInventory {
    settle_delay: Duration,
    clock: Arc<dyn Clock>,
    sink: SharedSink,
}

impl Default for PrinterInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterInventory {
    /// Inventory with a 500 ms settle delay on the system clock
    pub fn new() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            clock: Arc::new(SystemClock),
            sink: Arc::new(NullSink),
        }
    }

    /// Pause between sending a query and reading its reply
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Clock used for the settle delay
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where status lines go
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Configured settle delay
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Run every query in [`SectionLabel::ALL`] order.
    ///
    /// Callers sharing a session must hold it for the whole refresh, e.g.
    /// through [`SharedSession::exchange`](crate::protocol::SharedSession::exchange).
    pub fn refresh(
        &self,
        channel: &mut dyn CommandChannel,
    ) -> Result<InventoryRecord, ConnectionError> {
        if !channel.is_open() {
            self.sink
                .append_status(&ConnectionError::NotConnected.to_string(), true);
            return Err(ConnectionError::NotConnected);
        }

        let sections = SectionLabel::ALL
            .iter()
            .map(|&label| self.query_section(channel, label))
            .collect();

        self.sink.append_status("Data refreshed successfully.", false);
        Ok(InventoryRecord { sections })
    }

    fn query_section(
        &self,
        channel: &mut dyn CommandChannel,
        label: SectionLabel,
    ) -> InventorySection {
        let mut section = InventorySection::new(label);

        if let Err(e) = channel.send(&label.command()) {
            tracing::warn!("{} query failed: {}", label, e);
            section.error = Some(e.to_string());
            return section;
        }

        self.clock.sleep(self.settle_delay);

        let response = channel.receive(CollectionPolicy::UntilTerminal);
        if let Response::Partial { error, .. } = &response {
            tracing::warn!("{} reply incomplete: {}", label, error);
            section.error = Some(error.to_string());
        }
        section.entries = response
            .into_lines()
            .iter()
            .map(|line| parse_key_value(line))
            .collect();

        tracing::debug!("{}: {} entries", label, section.entries.len());
        section
    }
}
