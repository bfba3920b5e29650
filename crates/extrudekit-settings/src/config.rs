//! Configuration and settings management for ExtrudeKit
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in the platform config directory.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (ports, baud rate, timeouts, auto-home)
//! - Inventory settings (reply settle delay)
//! - Calibration settings (temperatures, lengths, polling)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the platform config dir
pub const APP_DIR_NAME: &str = "extrudekit";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Ports to try, in order. Empty means ask the system.
    pub preferred_ports: Vec<String>,
    /// Baud rate for serial connections
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Send G28 right after connecting
    pub auto_home: bool,
    /// Overall deadline for a terminal reply, in milliseconds. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_deadline_ms: Option<u64>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            preferred_ports: Vec::new(),
            baud_rate: 115200,
            read_timeout_ms: 2000,
            auto_home: false,
            response_deadline_ms: None,
        }
    }
}

/// Printer inventory settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Pause between sending a query and reading its reply, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
        }
    }
}

/// How calibration reads replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyCollection {
    /// Read until an `ok`/`error` line
    UntilTerminal,
    /// Drain whatever is already buffered
    #[default]
    Available,
}

impl std::fmt::Display for ReplyCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UntilTerminal => write!(f, "until_terminal"),
            Self::Available => write!(f, "available"),
        }
    }
}

/// Extrusion calibration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Hotend temperature required before extruding (°C)
    pub target_temp_c: f64,
    /// Smallest extrusion accepted (mm)
    pub min_extrude_mm: f64,
    /// Extrusion length the steps/mm correction is computed against (mm)
    pub reference_length_mm: f64,
    /// Priming move length (mm)
    pub prime_length_mm: f64,
    /// Feed rate for priming and extrusion moves (mm/min)
    pub feed_rate: f64,
    /// Temperature poll interval while heating (ms)
    pub poll_interval_ms: u64,
    /// Give up heating after this long (ms). `0` waits forever.
    pub heating_timeout_ms: u64,
    /// Reply collection used for temperature and steps queries
    pub collection: ReplyCollection,
    /// Pause before draining a reply with the `available` collection (ms)
    pub reply_settle_ms: u64,
}

impl CalibrationSettings {
    /// Heating deadline, `None` when `heating_timeout_ms` is `0`
    pub fn heating_timeout(&self) -> Option<Duration> {
        (self.heating_timeout_ms > 0).then(|| Duration::from_millis(self.heating_timeout_ms))
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            target_temp_c: 210.0,
            min_extrude_mm: 10.0,
            reference_length_mm: 100.0,
            prime_length_mm: 5.0,
            feed_rate: 300.0,
            poll_interval_ms: 1000,
            heating_timeout_ms: 600_000,
            collection: ReplyCollection::Available,
            reply_settle_ms: 500,
        }
    }
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Inventory settings
    pub inventory: InventorySettings,
    /// Calibration settings
    pub calibration: CalibrationSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform default location, e.g. `~/.config/extrudekit/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()).into()
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load config from `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let conn = &self.connection;
        if conn.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }
        if conn.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }
        if conn.response_deadline_ms == Some(0) {
            return Err(SettingsError::invalid(
                "connection.response_deadline_ms",
                "must be > 0 when set",
            ));
        }

        let cal = &self.calibration;
        if cal.target_temp_c <= 0.0 {
            return Err(SettingsError::invalid(
                "calibration.target_temp_c",
                "must be > 0",
            ));
        }
        if cal.min_extrude_mm <= 0.0 {
            return Err(SettingsError::invalid(
                "calibration.min_extrude_mm",
                "must be > 0",
            ));
        }
        if cal.reference_length_mm <= 0.0 {
            return Err(SettingsError::invalid(
                "calibration.reference_length_mm",
                "must be > 0",
            ));
        }
        if cal.prime_length_mm < 0.0 {
            return Err(SettingsError::invalid(
                "calibration.prime_length_mm",
                "must not be negative",
            ));
        }
        if cal.feed_rate <= 0.0 {
            return Err(SettingsError::invalid("calibration.feed_rate", "must be > 0"));
        }
        if cal.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "calibration.poll_interval_ms",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }
}
