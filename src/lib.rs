//! # ExtrudeKit
//!
//! Serial G-code control for Marlin-style 3D printers:
//! - Port discovery and first-success connection over USB serial
//! - Line-oriented call/response exchange with the printer
//! - Printer inventory (firmware, settings, position, endstops)
//! - Hotend temperature monitoring
//! - Two-leg extruder steps/mm calibration
//!
//! ## Architecture
//!
//! ExtrudeKit is organized as a workspace with multiple crates:
//!
//! 1. **extrudekit-core** - Errors, commands, message log, clock
//! 2. **extrudekit-communication** - Transport, protocol driver, connection, Marlin support, calibration
//! 3. **extrudekit-settings** - Configuration file handling
//! 4. **extrudekit** - Command-line binary that wires the crates together

use std::sync::Arc;
use std::time::Duration;

pub use extrudekit_communication::{
    firmware, list_ports, CalibrationConfig, CalibrationRunner, CalibrationState,
    CalibrationWorkflow, CancelToken, CollectionPolicy, CommandChannel, ConnectionManager,
    InventoryRecord, LinkParams, Measurement, PrinterInventory, Response, SerialOpener,
    SerialPortInfo, SharedSession, Step, SystemPortEnumerator, TemperatureMonitor,
    TemperatureReport,
};
pub use extrudekit_core::{
    CalibrationError, Clock, Command, ConnectionError, Error, Message, MessageLevel, MessageLog,
    MessageSink, NullSink, ProtocolError, Result, SharedSink, SystemClock,
};
pub use extrudekit_settings::{
    CalibrationSettings, Config, ConnectionSettings, InventorySettings, ReplyCollection,
    SettingsError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - RUST_LOG environment variable support (default `info`)
/// - Human-readable output on stderr, or JSON lines with `json`
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

/// Echoes user-facing messages to stdout, one timestamped line each
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn append(&self, level: MessageLevel, text: &str) {
        let message = Message::new(level, text);
        match level {
            MessageLevel::Error => {
                println!("{} Error: {}", message.timestamp.format("[%H:%M:%S]"), text)
            }
            _ => println!("{}", message),
        }
    }
}

/// Serial line parameters from the connection settings
pub fn link_params(settings: &ConnectionSettings) -> LinkParams {
    LinkParams {
        baud_rate: settings.baud_rate,
        read_timeout: Duration::from_millis(settings.read_timeout_ms),
    }
}

/// Collection policy for a configured reply mode
pub fn collection_policy(mode: ReplyCollection) -> CollectionPolicy {
    match mode {
        ReplyCollection::UntilTerminal => CollectionPolicy::UntilTerminal,
        ReplyCollection::Available => CollectionPolicy::Available,
    }
}

/// Workflow tunables from the calibration settings
pub fn calibration_config(settings: &CalibrationSettings) -> CalibrationConfig {
    CalibrationConfig {
        target_temp_c: settings.target_temp_c,
        min_extrude_mm: settings.min_extrude_mm,
        reference_length_mm: settings.reference_length_mm,
        prime_length_mm: settings.prime_length_mm,
        feed_rate: settings.feed_rate,
        poll_interval: Duration::from_millis(settings.poll_interval_ms),
        heating_timeout: settings.heating_timeout(),
        policy: collection_policy(settings.collection),
        reply_settle: Duration::from_millis(settings.reply_settle_ms),
    }
}

/// Inventory using the configured settle delay on the system clock
pub fn printer_inventory(settings: &InventorySettings, sink: SharedSink) -> PrinterInventory {
    PrinterInventory::new()
        .with_settle_delay(Duration::from_millis(settings.settle_delay_ms))
        .with_sink(sink)
}

/// Serial connection manager for `config`
pub fn connection_manager(config: &Config, sink: SharedSink) -> ConnectionManager {
    ConnectionManager::new(Arc::new(SerialOpener))
        .with_params(link_params(&config.connection))
        .with_sink(sink)
        .with_response_deadline(
            config
                .connection
                .response_deadline_ms
                .map(Duration::from_millis),
        )
}

/// Ports to try: explicit ones first, then configured ones, else an empty
/// list meaning "ask the system"
pub fn candidate_ports(explicit: &[String], settings: &ConnectionSettings) -> Vec<String> {
    if explicit.is_empty() {
        settings.preferred_ports.clone()
    } else {
        explicit.to_vec()
    }
}
