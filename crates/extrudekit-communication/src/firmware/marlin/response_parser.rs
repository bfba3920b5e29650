//! Marlin Response Parser
//!
//! Pulls values out of reply lines. Each extractor depends on the exact reply
//! shape (`T:<num>`, `M92 ... E<num>`); anything else is a parse failure,
//! never a default.

use serde::Serialize;

/// Split a line into a `(key, value)` pair.
///
/// Splits on the first `:`, else on the first `=`, else the whole line is
/// the key with an empty value. Both halves are trimmed.
pub fn parse_key_value(line: &str) -> (String, String) {
    let split = line.split_once(':').or_else(|| line.split_once('='));
    match split {
        Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
        None => (line.trim().to_string(), String::new()),
    }
}

/// Leading number of `text` and how many bytes it spans,
/// e.g. `205.3` from `205.3 /210`
fn leading_number(text: &str) -> Option<(f64, usize)> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok().map(|value| (value, end))
}

/// Number right after the first occurrence of `marker`
fn number_after(line: &str, marker: &str) -> Option<f64> {
    let start = line.find(marker)? + marker.len();
    leading_number(&line[start..]).map(|(value, _)| value)
}

/// `(current, target)` for a `<marker><num> /<num>` group
fn reading_after(line: &str, marker: &str) -> Option<(f64, Option<f64>)> {
    let start = line.find(marker)? + marker.len();
    let (current, len) = leading_number(&line[start..])?;
    let target = line[start + len..]
        .trim_start()
        .strip_prefix('/')
        .and_then(|rest| leading_number(rest.trim_start()))
        .map(|(value, _)| value);
    Some((current, target))
}

/// Hotend temperature from a single `T:` line
pub fn parse_hotend_temperature(line: &str) -> Option<f64> {
    number_after(line, "T:")
}

/// Hotend temperature from the first line containing `T:`.
///
/// Only that first line is considered; if it does not parse, there is no
/// reading.
pub fn find_hotend_temperature<S: AsRef<str>>(lines: &[S]) -> Option<f64> {
    lines
        .iter()
        .map(AsRef::<str>::as_ref)
        .find(|line| line.contains("T:"))
        .and_then(parse_hotend_temperature)
}

/// Extruder steps/mm from an `M92` settings echo line
pub fn parse_extruder_steps(line: &str) -> Option<f64> {
    let start = line.find("M92")? + "M92".len();
    line[start..]
        .split_whitespace()
        .find_map(|token| token.strip_prefix('E'))
        .and_then(|value| value.parse().ok())
}

/// Extruder steps/mm from the first line containing `M92`
pub fn find_extruder_steps<S: AsRef<str>>(lines: &[S]) -> Option<f64> {
    lines
        .iter()
        .map(AsRef::<str>::as_ref)
        .find(|line| line.contains("M92"))
        .and_then(parse_extruder_steps)
}

/// Parsed `M105` temperature report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureReport {
    /// Hotend temperature (°C)
    pub hotend: f64,
    /// Hotend target (°C)
    pub hotend_target: Option<f64>,
    /// Bed temperature (°C)
    pub bed: Option<f64>,
    /// Bed target (°C)
    pub bed_target: Option<f64>,
}

impl TemperatureReport {
    /// Parse a line like `ok T:205.3 /210 B:60 /60 @:127`
    pub fn parse(line: &str) -> Option<Self> {
        let (hotend, hotend_target) = reading_after(line, "T:")?;
        let (bed, bed_target) = match reading_after(line, "B:") {
            Some((bed, target)) => (Some(bed), target),
            None => (None, None),
        };
        Some(Self {
            hotend,
            hotend_target,
            bed,
            bed_target,
        })
    }

    /// Report from the first line containing `T:`
    pub fn find<S: AsRef<str>>(lines: &[S]) -> Option<Self> {
        lines
            .iter()
            .map(AsRef::<str>::as_ref)
            .find(|line| line.contains("T:"))
            .and_then(Self::parse)
    }
}

impl std::fmt::Display for TemperatureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hotend {:.1}°C", self.hotend)?;
        if let Some(target) = self.hotend_target {
            write!(f, " / {:.1}°C", target)?;
        }
        if let Some(bed) = self.bed {
            write!(f, ", Bed {:.1}°C", bed)?;
            if let Some(target) = self.bed_target {
                write!(f, " / {:.1}°C", target)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_heuristic() {
        assert_eq!(parse_key_value("a: b"), ("a".into(), "b".into()));
        assert_eq!(parse_key_value("a=b"), ("a".into(), "b".into()));
        assert_eq!(parse_key_value("a:b=c"), ("a".into(), "b=c".into()));
        assert_eq!(parse_key_value("plain"), ("plain".into(), "".into()));
        assert_eq!(
            parse_key_value("FIRMWARE_NAME:Marlin 2.1.2 (Jan 1 2024 12:00:00)"),
            ("FIRMWARE_NAME".into(), "Marlin 2.1.2 (Jan 1 2024 12:00:00)".into())
        );
        assert_eq!(
            parse_key_value("x_min: open"),
            ("x_min".into(), "open".into())
        );
    }

    #[test]
    fn test_hotend_temperature() {
        assert_eq!(
            parse_hotend_temperature("ok T:205.3 /210 B:60 /60"),
            Some(205.3)
        );
        assert_eq!(parse_hotend_temperature("T:22.50 /0.00 B:21.90 /0.00 @:0 B@:0"), Some(22.5));
        assert_eq!(parse_hotend_temperature("ok B:60 /60"), None);
        assert_eq!(parse_hotend_temperature("ok T:abc"), None);
    }

    #[test]
    fn test_first_matching_line_wins() {
        let lines = ["echo:busy: processing", "T:180.0 /210", "ok T:209.0 /210"];
        assert_eq!(find_hotend_temperature(&lines), Some(180.0));

        // The first T: line decides, even when it does not parse
        let lines = ["T:--- /210", "ok T:209.0 /210"];
        assert_eq!(find_hotend_temperature(&lines), None);

        let lines: [&str; 2] = ["ok", "echo:SD card ok"];
        assert_eq!(find_hotend_temperature(&lines), None);
    }

    #[test]
    fn test_extruder_steps() {
        assert_eq!(
            parse_extruder_steps("echo:  M92 X80.00 Y80.00 Z400.00 E93.00"),
            Some(93.0)
        );
        assert_eq!(parse_extruder_steps("M92 E400"), Some(400.0));
        assert_eq!(parse_extruder_steps("echo:  M92 X80.00 Y80.00 Z400.00"), None);
        assert_eq!(parse_extruder_steps("M92 Eabc"), None);

        let lines = [
            "echo:; Steps per unit:",
            "echo:  M92 X80.00 Y80.00 Z400.00 E93.00",
            "echo:  M203 X500.00 Y500.00 Z5.00 E25.00",
            "ok",
        ];
        assert_eq!(find_extruder_steps(&lines), Some(93.0));
    }

    #[test]
    fn test_temperature_report() {
        let report = TemperatureReport::parse("ok T:205.3 /210 B:60 /60").unwrap();
        assert_eq!(report.hotend, 205.3);
        assert_eq!(report.hotend_target, Some(210.0));
        assert_eq!(report.bed, Some(60.0));
        assert_eq!(report.bed_target, Some(60.0));

        let report = TemperatureReport::parse("T:24.1").unwrap();
        assert_eq!(report.hotend_target, None);
        assert_eq!(report.bed, None);
        assert_eq!(report.to_string(), "Hotend 24.1°C");
    }
}
