//! Marlin command builders
//!
//! Every command the session ever sends is built here.

use extrudekit_core::Command;

/// Firmware name, version and capabilities
pub const FIRMWARE_INFO: &str = "M115";
/// Echo of the active settings
pub const REPORT_SETTINGS: &str = "M503";
/// Current position
pub const REPORT_POSITION: &str = "M114";
/// Endstop states
pub const ENDSTOP_STATUS: &str = "M119";
/// Temperature report
pub const REPORT_TEMPERATURES: &str = "M105";
/// Allow extrusion below the minimum temperature
pub const ALLOW_COLD_EXTRUSION: &str = "M302";
/// Store settings to EEPROM
pub const SAVE_SETTINGS: &str = "M500";
/// Home all axes
pub const HOME_ALL: &str = "G28";

/// Format a number the way it goes on the wire: no trailing `.0`
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// `M105`
pub fn report_temperatures() -> Command {
    Command::new(REPORT_TEMPERATURES)
}

/// `M503`
pub fn report_settings() -> Command {
    Command::new(REPORT_SETTINGS)
}

/// `M104 S<celsius>`: set hotend target without waiting
pub fn set_hotend_temperature(celsius: f64) -> Command {
    Command::new(format!("M104 S{}", format_number(celsius)))
}

/// `M302`
pub fn allow_cold_extrusion() -> Command {
    Command::new(ALLOW_COLD_EXTRUSION)
}

/// `G1 E<length> F<feed>`: move the extruder only
pub fn extrude(length_mm: f64, feed_rate: f64) -> Command {
    Command::new(format!(
        "G1 E{} F{}",
        format_number(length_mm),
        format_number(feed_rate)
    ))
}

/// `M92 E<steps>` with two decimals
pub fn set_extruder_steps(steps_per_mm: f64) -> Command {
    Command::new(format!("M92 E{:.2}", steps_per_mm))
}

/// `M500`
pub fn save_settings() -> Command {
    Command::new(SAVE_SETTINGS)
}

/// `G28`
pub fn home_all() -> Command {
    Command::new(HOME_ALL)
}
