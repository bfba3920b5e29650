//! ExtrudeKit Settings Crate
//!
//! Handles application configuration: defaults, file loading and saving,
//! validation, and the platform-specific config location.

pub mod config;
pub mod error;

pub use config::{
    CalibrationSettings, Config, ConnectionSettings, InventorySettings, ReplyCollection,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
