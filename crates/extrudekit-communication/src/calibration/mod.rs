//! Extruder steps/mm calibration
//!
//! The workflow is a pollable state machine: [`CalibrationWorkflow::step`]
//! performs one phase's I/O and says what should happen next. The
//! [`CalibrationRunner`] drives it against a shared session with a clock,
//! a cancel token and the heating deadline.
//!
//! A full calibration is two legs separated by a physical measurement:
//!
//! 1. `begin_extrusion` → Measuring → (HeatingWait) → Priming → Extruding →
//!    AwaitingMeasurement
//! 2. `begin_adjustment` → AdjustingFactor → Idle

mod runner;
mod workflow;

pub use runner::CalibrationRunner;
pub use workflow::CalibrationWorkflow;

use crate::protocol::CollectionPolicy;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Filament lengths read off the spool, in mm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Measurement {
    /// Length measured before extruding
    pub initial_length_mm: f64,
    /// Length left after extruding
    pub remaining_length_mm: f64,
}

impl Measurement {
    /// Pair of lengths
    pub fn new(initial_length_mm: f64, remaining_length_mm: f64) -> Self {
        Self {
            initial_length_mm,
            remaining_length_mm,
        }
    }

    /// `initial - remaining`
    pub fn difference(&self) -> f64 {
        self.initial_length_mm - self.remaining_length_mm
    }

    /// Both lengths are real numbers
    pub fn is_finite(&self) -> bool {
        self.initial_length_mm.is_finite() && self.remaining_length_mm.is_finite()
    }
}

/// What the workflow has learned so far.
///
/// Only written when a phase completes; a failed phase leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationState {
    /// Initial length of the last completed extrusion
    pub initial_length_mm: f64,
    /// Remaining length of the last completed extrusion
    pub remaining_length_mm: f64,
    /// Last hotend reading
    pub last_known_temp_c: Option<f64>,
    /// Steps/mm written by the last adjustment, rounded to 2 decimals
    pub steps_per_mm: Option<f64>,
}

/// Tunables for the calibration workflow
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Hotend temperature required before extruding (°C)
    pub target_temp_c: f64,
    /// Smallest extrusion accepted (mm)
    pub min_extrude_mm: f64,
    /// Length the adjustment factor is computed against (mm)
    pub reference_length_mm: f64,
    /// Priming extrusion before the measured run (mm)
    pub prime_length_mm: f64,
    /// Extrusion feed rate (mm/min)
    pub feed_rate: f64,
    /// Delay between temperature polls while heating
    pub poll_interval: Duration,
    /// Give up heating after this long; `None` waits forever
    pub heating_timeout: Option<Duration>,
    /// How query replies are collected
    pub policy: CollectionPolicy,
    /// Pause between a command and an `Available` drain of its reply
    pub reply_settle: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_temp_c: 210.0,
            min_extrude_mm: 10.0,
            reference_length_mm: 100.0,
            prime_length_mm: 5.0,
            feed_rate: 300.0,
            poll_interval: Duration::from_secs(1),
            heating_timeout: Some(Duration::from_secs(600)),
            policy: CollectionPolicy::Available,
            reply_settle: Duration::from_millis(500),
        }
    }
}

/// Where the workflow is
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// Nothing in progress
    Idle,
    /// Checking the hotend before extruding `length_mm`
    Measuring {
        /// Length that will be extruded
        length_mm: f64,
    },
    /// Waiting for the hotend to reach the target
    HeatingWait {
        /// Length that will be extruded
        length_mm: f64,
    },
    /// Priming the nozzle
    Priming {
        /// Length that will be extruded
        length_mm: f64,
    },
    /// Running the measured extrusion
    Extruding {
        /// Length being extruded
        length_mm: f64,
    },
    /// Waiting for the user to measure what is left
    AwaitingMeasurement {
        /// Length that was extruded
        extruded_mm: f64,
    },
    /// Computing and writing the new steps/mm
    AdjustingFactor {
        /// Length the user measured as actually extruded
        actual_extruded_mm: f64,
    },
}

impl Phase {
    /// Short name for messages
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Measuring { .. } => "measuring",
            Phase::HeatingWait { .. } => "heating",
            Phase::Priming { .. } => "priming",
            Phase::Extruding { .. } => "extruding",
            Phase::AwaitingMeasurement { .. } => "awaiting measurement",
            Phase::AdjustingFactor { .. } => "adjusting",
        }
    }

    /// Whether `step` has work to do
    pub fn is_active(&self) -> bool {
        !matches!(self, Phase::Idle | Phase::AwaitingMeasurement { .. })
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one [`CalibrationWorkflow::step`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Call `step` again right away
    Continue,
    /// Call `step` again after the given delay
    Wait(Duration),
    /// The extrusion leg finished
    Extruded {
        /// Length extruded (mm)
        length_mm: f64,
    },
    /// The adjustment leg finished
    Adjusted {
        /// Steps/mm read from the printer
        previous_steps: f64,
        /// Steps/mm written, rounded to 2 decimals
        new_steps: f64,
    },
}

impl Step {
    /// Whether the leg is over
    pub fn is_settled(&self) -> bool {
        matches!(self, Step::Extruded { .. } | Step::Adjusted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CalibrationConfig::default();
        assert_eq!(config.target_temp_c, 210.0);
        assert_eq!(config.min_extrude_mm, 10.0);
        assert_eq!(config.reference_length_mm, 100.0);
        assert_eq!(config.policy, CollectionPolicy::Available);
        assert_eq!(config.reply_settle, Duration::from_millis(500));
    }

    #[test]
    fn test_measurement_finiteness() {
        assert!(Measurement::new(120.0, 20.0).is_finite());
        assert!(!Measurement::new(f64::NAN, 20.0).is_finite());
        assert!(!Measurement::new(120.0, f64::NEG_INFINITY).is_finite());
    }

    #[test]
    fn test_phase_activity() {
        assert!(!Phase::Idle.is_active());
        assert!(!Phase::AwaitingMeasurement { extruded_mm: 15.0 }.is_active());
        assert!(Phase::HeatingWait { length_mm: 15.0 }.is_active());
        assert_eq!(Phase::HeatingWait { length_mm: 15.0 }.to_string(), "heating");
    }
}
