//! Single-value queries used by calibration and the temperature monitor

use super::commands;
use super::response_parser::{find_extruder_steps, find_hotend_temperature, TemperatureReport};
use crate::protocol::{CollectionPolicy, CommandChannel, Response};
use extrudekit_core::CalibrationError;

fn require_open(channel: &dyn CommandChannel) -> Result<(), CalibrationError> {
    if channel.is_open() {
        Ok(())
    } else {
        Err(CalibrationError::NotConnected)
    }
}

/// Pick a value out of `response`, or explain why there is none.
///
/// A value found in the lines that did arrive wins over a transport failure.
fn extract<T>(
    response: Response,
    find: impl FnOnce(&[String]) -> Option<T>,
    missing: CalibrationError,
) -> Result<T, CalibrationError> {
    if let Some(value) = find(response.lines()) {
        return Ok(value);
    }
    match response {
        Response::Partial { error, .. } => Err(error.into()),
        Response::Complete(_) => Err(missing),
    }
}

/// Send `M105` and read the hotend temperature
pub fn query_hotend_temperature(
    channel: &mut dyn CommandChannel,
    policy: CollectionPolicy,
) -> Result<f64, CalibrationError> {
    require_open(channel)?;
    let response = channel.call(&commands::report_temperatures(), policy);
    let temperature = extract(
        response,
        find_hotend_temperature::<String>,
        CalibrationError::TemperatureUnavailable,
    )?;
    tracing::debug!("Hotend temperature {:.1}°C", temperature);
    Ok(temperature)
}

/// Send `M105` and read the full temperature report
pub fn query_temperatures(
    channel: &mut dyn CommandChannel,
    policy: CollectionPolicy,
) -> Result<TemperatureReport, CalibrationError> {
    require_open(channel)?;
    let response = channel.call(&commands::report_temperatures(), policy);
    extract(
        response,
        TemperatureReport::find::<String>,
        CalibrationError::TemperatureUnavailable,
    )
}

/// Send `M503` and read the extruder steps/mm from its `M92` line
pub fn query_extruder_steps(
    channel: &mut dyn CommandChannel,
    policy: CollectionPolicy,
) -> Result<f64, CalibrationError> {
    require_open(channel)?;
    let response = channel.call(&commands::report_settings(), policy);
    extract(
        response,
        find_extruder_steps::<String>,
        CalibrationError::StepsUnavailable,
    )
}
