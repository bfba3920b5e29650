//! Calibration state machine

use super::{CalibrationConfig, CalibrationState, Measurement, Phase, Step};
use crate::firmware::marlin::commands::{self, format_number};
use crate::firmware::marlin::queries::{query_extruder_steps, query_hotend_temperature};
use crate::protocol::{CollectionPolicy, CommandChannel, Response};
use extrudekit_core::{
    CalibrationError, Clock, Command, NullSink, ProtocolError, SharedSink, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;

/// Extruder steps/mm calibration
pub struct CalibrationWorkflow {
    config: CalibrationConfig,
    phase: Phase,
    pending: Option<Measurement>,
    state: CalibrationState,
    sink: SharedSink,
    clock: Arc<dyn Clock>,
}

impl Default for CalibrationWorkflow {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

impl CalibrationWorkflow {
    /// Idle workflow with `config`
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            pending: None,
            state: CalibrationState::default(),
            sink: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Where status lines go
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Use `clock` for reply settle delays
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current tunables
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Values recorded by completed phases
    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    fn require_phase(&self, requested: &str) -> Result<(), CalibrationError> {
        match self.phase {
            Phase::Idle | Phase::AwaitingMeasurement { .. } => Ok(()),
            current => Err(CalibrationError::InvalidPhase {
                current: current.name().to_string(),
                requested: requested.to_string(),
            }),
        }
    }

    /// Validate `measurement` and arm the extrusion leg.
    ///
    /// A rejected measurement leaves the phase as it was.
    pub fn begin_extrusion(&mut self, measurement: Measurement) -> Result<f64, CalibrationError> {
        self.require_phase("start extrusion")?;

        if !measurement.is_finite() {
            return Err(self.reject("Filament lengths must be finite numbers."));
        }
        if measurement.initial_length_mm < measurement.remaining_length_mm {
            return Err(self.reject("Remaining length exceeds initial length."));
        }
        let length_mm = measurement.difference();
        if length_mm < self.config.min_extrude_mm {
            return Err(self.reject(&format!(
                "You must extrude at least {}mm.",
                format_number(self.config.min_extrude_mm)
            )));
        }

        tracing::info!("Starting extrusion of {}mm", length_mm);
        self.pending = Some(measurement);
        self.phase = Phase::Measuring { length_mm };
        Ok(length_mm)
    }

    /// Validate `measurement` and arm the adjustment leg
    pub fn begin_adjustment(&mut self, measurement: Measurement) -> Result<f64, CalibrationError> {
        self.require_phase("adjust steps")?;

        let actual_extruded_mm = measurement.difference();
        if !measurement.is_finite() || actual_extruded_mm <= 0.0 {
            return Err(self.reject("Invalid extrusion measurement."));
        }

        tracing::info!("Adjusting steps for {}mm actually extruded", actual_extruded_mm);
        self.pending = Some(measurement);
        self.phase = Phase::AdjustingFactor { actual_extruded_mm };
        Ok(actual_extruded_mm)
    }

    /// Abandon the current leg. Returns false if nothing was running.
    pub fn cancel(&mut self) -> bool {
        if self.phase == Phase::Idle {
            return false;
        }
        self.abort(CalibrationError::Cancelled);
        true
    }

    /// Report a bad measurement without leaving the current phase
    fn reject(&self, reason: &str) -> CalibrationError {
        tracing::warn!("Rejected measurement while {}: {}", self.phase, reason);
        self.sink.append_status(reason, true);
        CalibrationError::invalid_measurement(reason)
    }

    /// Back to idle, reporting `error`. Recorded state is left alone.
    pub(crate) fn abort(&mut self, error: CalibrationError) -> CalibrationError {
        tracing::warn!("Calibration stopped while {}: {}", self.phase, error);
        self.sink.append_status(&error.to_string(), true);
        self.phase = Phase::Idle;
        self.pending = None;
        error
    }

    /// Run the I/O for the current phase once.
    ///
    /// Any failure other than calling this in an inactive phase returns the
    /// workflow to idle.
    pub fn step(&mut self, channel: &mut dyn CommandChannel) -> Result<Step, CalibrationError> {
        if !self.phase.is_active() {
            return Err(CalibrationError::InvalidPhase {
                current: self.phase.name().to_string(),
                requested: "step".to_string(),
            });
        }
        if !channel.is_open() {
            return Err(self.abort(CalibrationError::NotConnected));
        }

        let clock = self.clock.clone();
        let mut settling = Settling {
            inner: channel,
            clock: clock.as_ref(),
            delay: self.config.reply_settle,
        };
        let channel: &mut dyn CommandChannel = &mut settling;

        let result = match self.phase {
            Phase::Measuring { length_mm } => self.check_temperature(channel, length_mm),
            Phase::HeatingWait { length_mm } => self.wait_for_heat(channel, length_mm),
            Phase::Priming { length_mm } => self.prime(channel, length_mm),
            Phase::Extruding { length_mm } => self.extrude(channel, length_mm),
            Phase::AdjustingFactor { actual_extruded_mm } => {
                self.adjust(channel, actual_extruded_mm)
            }
            Phase::Idle | Phase::AwaitingMeasurement { .. } => Ok(Step::Continue),
        };
        result.map_err(|e| self.abort(e))
    }

    /// Send `command` and collect its reply with the configured policy
    fn command(
        &self,
        channel: &mut dyn CommandChannel,
        command: Command,
    ) -> Result<Vec<String>, CalibrationError> {
        match channel.call(&command, self.config.policy) {
            Response::Complete(lines) => Ok(lines),
            Response::Partial { error, .. } => Err(error.into()),
        }
    }

    fn check_temperature(
        &mut self,
        channel: &mut dyn CommandChannel,
        length_mm: f64,
    ) -> Result<Step, CalibrationError> {
        let temperature = query_hotend_temperature(channel, self.config.policy)?;

        if temperature < self.config.target_temp_c {
            let target = format_number(self.config.target_temp_c);
            self.command(
                channel,
                commands::set_hotend_temperature(self.config.target_temp_c),
            )?;
            self.state.last_known_temp_c = Some(temperature);
            self.sink
                .append_status(&format!("Heating hotend to {}°C...", target), false);
            self.phase = Phase::HeatingWait { length_mm };
            return Ok(Step::Wait(self.config.poll_interval));
        }

        self.state.last_known_temp_c = Some(temperature);
        self.phase = Phase::Priming { length_mm };
        Ok(Step::Continue)
    }

    fn wait_for_heat(
        &mut self,
        channel: &mut dyn CommandChannel,
        length_mm: f64,
    ) -> Result<Step, CalibrationError> {
        let temperature = match query_hotend_temperature(channel, self.config.policy) {
            Ok(temperature) => temperature,
            Err(CalibrationError::TemperatureUnavailable) => {
                tracing::debug!("No temperature in poll reply, still waiting");
                return Ok(Step::Wait(self.config.poll_interval));
            }
            Err(e) => return Err(e),
        };

        self.state.last_known_temp_c = Some(temperature);
        if temperature < self.config.target_temp_c {
            tracing::debug!(
                "Hotend at {:.1}°C of {}°C",
                temperature,
                self.config.target_temp_c
            );
            return Ok(Step::Wait(self.config.poll_interval));
        }

        self.sink.append_status(
            &format!(
                "Hotend reached {}°C.",
                format_number(self.config.target_temp_c)
            ),
            false,
        );
        self.phase = Phase::Priming { length_mm };
        Ok(Step::Continue)
    }

    fn prime(
        &mut self,
        channel: &mut dyn CommandChannel,
        length_mm: f64,
    ) -> Result<Step, CalibrationError> {
        self.command(channel, commands::allow_cold_extrusion())?;
        self.command(
            channel,
            commands::extrude(self.config.prime_length_mm, self.config.feed_rate),
        )?;
        self.phase = Phase::Extruding { length_mm };
        Ok(Step::Continue)
    }

    fn extrude(
        &mut self,
        channel: &mut dyn CommandChannel,
        length_mm: f64,
    ) -> Result<Step, CalibrationError> {
        self.command(channel, commands::extrude(length_mm, self.config.feed_rate))?;

        if let Some(measurement) = self.pending.take() {
            self.state.initial_length_mm = measurement.initial_length_mm;
            self.state.remaining_length_mm = measurement.remaining_length_mm;
        }
        self.sink.append_status(
            &format!(
                "Extruded {}mm. Measure remaining filament length.",
                format_number(length_mm)
            ),
            false,
        );
        self.phase = Phase::AwaitingMeasurement {
            extruded_mm: length_mm,
        };
        Ok(Step::Extruded { length_mm })
    }

    fn adjust(
        &mut self,
        channel: &mut dyn CommandChannel,
        actual_extruded_mm: f64,
    ) -> Result<Step, CalibrationError> {
        let factor = self.config.reference_length_mm / actual_extruded_mm;
        let previous_steps = query_extruder_steps(channel, self.config.policy)?;
        let new_steps = previous_steps * factor;
        tracing::info!(
            "Steps/mm {:.2} x {:.4} = {:.2}",
            previous_steps,
            factor,
            new_steps
        );

        self.command(channel, commands::set_extruder_steps(new_steps))?;
        self.command(channel, commands::save_settings())?;

        let new_steps = (new_steps * 100.0).round() / 100.0;
        self.state.steps_per_mm = Some(new_steps);
        self.pending = None;
        self.sink.append_status(
            &format!("Extrusion adjusted. New steps/mm: {:.2}", new_steps),
            false,
        );
        self.phase = Phase::Idle;
        Ok(Step::Adjusted {
            previous_steps,
            new_steps,
        })
    }
}

/// Gives the printer time to answer before an `Available` drain
struct Settling<'a> {
    inner: &'a mut dyn CommandChannel,
    clock: &'a dyn Clock,
    delay: Duration,
}

impl CommandChannel for Settling<'_> {
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn port_id(&self) -> Option<&str> {
        self.inner.port_id()
    }

    fn send(&mut self, command: &Command) -> Result<(), ProtocolError> {
        self.inner.send(command)
    }

    fn receive(&mut self, policy: CollectionPolicy) -> Response {
        if policy == CollectionPolicy::Available && !self.delay.is_zero() {
            self.clock.sleep(self.delay);
        }
        self.inner.receive(policy)
    }
}

impl std::fmt::Debug for CalibrationWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationWorkflow")
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extrusion_measurement_validation() {
        let mut workflow = CalibrationWorkflow::default();

        let err = workflow
            .begin_extrusion(Measurement::new(15.0, 10.0))
            .unwrap_err();
        assert_eq!(
            err,
            CalibrationError::invalid_measurement("You must extrude at least 10mm.")
        );
        assert_eq!(workflow.phase(), Phase::Idle);

        let err = workflow
            .begin_extrusion(Measurement::new(10.0, 25.0))
            .unwrap_err();
        assert_eq!(
            err,
            CalibrationError::invalid_measurement("Remaining length exceeds initial length.")
        );

        assert_eq!(workflow.begin_extrusion(Measurement::new(25.0, 10.0)), Ok(15.0));
        assert_eq!(workflow.phase(), Phase::Measuring { length_mm: 15.0 });
        assert_eq!(workflow.state(), &CalibrationState::default());
    }

    #[test]
    fn test_adjustment_measurement_validation() {
        let mut workflow = CalibrationWorkflow::default();
        assert!(matches!(
            workflow.begin_adjustment(Measurement::new(10.0, 10.0)),
            Err(CalibrationError::InvalidMeasurement { .. })
        ));
        assert_eq!(workflow.begin_adjustment(Measurement::new(150.0, 100.0)), Ok(50.0));
        assert_eq!(
            workflow.phase(),
            Phase::AdjustingFactor {
                actual_extruded_mm: 50.0
            }
        );
    }

    #[test]
    fn test_non_finite_lengths_are_rejected() {
        let mut workflow = CalibrationWorkflow::default();
        let bad = [
            Measurement::new(f64::NAN, 10.0),
            Measurement::new(120.0, f64::NAN),
            Measurement::new(f64::INFINITY, 10.0),
            Measurement::new(120.0, f64::NEG_INFINITY),
        ];

        for measurement in bad {
            assert!(matches!(
                workflow.begin_extrusion(measurement),
                Err(CalibrationError::InvalidMeasurement { .. })
            ));
            assert_eq!(
                workflow.begin_adjustment(measurement),
                Err(CalibrationError::invalid_measurement(
                    "Invalid extrusion measurement."
                ))
            );
            assert_eq!(workflow.phase(), Phase::Idle);
        }
    }

    #[test]
    fn test_busy_workflow_rejects_new_leg() {
        let mut workflow = CalibrationWorkflow::default();
        workflow.begin_extrusion(Measurement::new(120.0, 100.0)).unwrap();

        let err = workflow
            .begin_adjustment(Measurement::new(120.0, 30.0))
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot adjust steps while measuring");
        // The running leg is untouched
        assert_eq!(workflow.phase(), Phase::Measuring { length_mm: 20.0 });

        assert!(workflow.cancel());
        assert_eq!(workflow.phase(), Phase::Idle);
        assert!(!workflow.cancel());
    }
}
