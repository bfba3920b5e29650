//! Drives a workflow leg to completion on a shared session

use super::{CalibrationWorkflow, Measurement, Step};
use crate::cancel::CancelToken;
use crate::protocol::SharedSession;
use extrudekit_core::{CalibrationError, Clock, SystemClock};
use std::sync::Arc;
use std::time::Instant;

/// Repeatedly steps a [`CalibrationWorkflow`], sleeping on `Wait`.
///
/// The session lock is taken for one step at a time, so other users of the
/// session can get in between temperature polls.
pub struct CalibrationRunner {
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
}

impl Default for CalibrationRunner {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), CancelToken::new())
    }
}

impl CalibrationRunner {
    /// Runner sleeping on `clock` and stopping when `cancel` fires
    pub fn new(clock: Arc<dyn Clock>, cancel: CancelToken) -> Self {
        Self { clock, cancel }
    }

    /// Token that stops this runner
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Step until the armed leg finishes.
    ///
    /// Cancellation is checked before every step. The heating deadline from
    /// the workflow config is measured from the first `Wait`.
    pub fn run_until_settled(
        &self,
        workflow: &mut CalibrationWorkflow,
        session: &SharedSession,
    ) -> Result<Step, CalibrationError> {
        let mut waiting_since: Option<Instant> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(workflow.abort(CalibrationError::Cancelled));
            }

            match session.exchange(|driver| workflow.step(driver))? {
                Step::Continue => waiting_since = None,
                Step::Wait(delay) => {
                    let since = *waiting_since.get_or_insert_with(|| self.clock.now());
                    if let Some(timeout) = workflow.config().heating_timeout {
                        if self.clock.elapsed(since) >= timeout {
                            return Err(workflow.abort(CalibrationError::HeatingTimedOut {
                                timeout_ms: timeout.as_millis() as u64,
                            }));
                        }
                    }
                    self.clock.sleep(delay);
                }
                settled => return Ok(settled),
            }
        }
    }

    /// Arm and run the extrusion leg. Returns the extruded length.
    pub fn extrude(
        &self,
        workflow: &mut CalibrationWorkflow,
        session: &SharedSession,
        measurement: Measurement,
    ) -> Result<f64, CalibrationError> {
        workflow.begin_extrusion(measurement)?;
        match self.run_until_settled(workflow, session)? {
            Step::Extruded { length_mm } => Ok(length_mm),
            other => Err(unexpected(workflow, other, "finish extrusion")),
        }
    }

    /// Arm and run the adjustment leg. Returns `(previous, new)` steps/mm.
    pub fn adjust_steps(
        &self,
        workflow: &mut CalibrationWorkflow,
        session: &SharedSession,
        measurement: Measurement,
    ) -> Result<(f64, f64), CalibrationError> {
        workflow.begin_adjustment(measurement)?;
        match self.run_until_settled(workflow, session)? {
            Step::Adjusted {
                previous_steps,
                new_steps,
            } => Ok((previous_steps, new_steps)),
            other => Err(unexpected(workflow, other, "finish adjustment")),
        }
    }
}

fn unexpected(workflow: &CalibrationWorkflow, step: Step, requested: &str) -> CalibrationError {
    tracing::error!("Leg settled with {:?} while {}", step, workflow.phase());
    CalibrationError::InvalidPhase {
        current: workflow.phase().name().to_string(),
        requested: requested.to_string(),
    }
}
