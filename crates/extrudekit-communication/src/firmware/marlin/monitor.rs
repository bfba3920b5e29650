//! Periodic temperature polling

use super::queries::query_temperatures;
use super::response_parser::TemperatureReport;
use crate::cancel::CancelToken;
use crate::protocol::{CollectionPolicy, SharedSession};
use extrudekit_core::{CalibrationError, Clock};
use std::ops::ControlFlow;
use std::time::Duration;

/// Polls `M105` on a fixed interval and hands each reading to a callback
#[derive(Debug, Clone, Copy)]
pub struct TemperatureMonitor {
    interval: Duration,
    policy: CollectionPolicy,
}

impl Default for TemperatureMonitor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl TemperatureMonitor {
    /// Monitor polling every `interval`, waiting for a terminal reply
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            policy: CollectionPolicy::UntilTerminal,
        }
    }

    /// How replies are collected
    pub fn with_policy(mut self, policy: CollectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Poll interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One reading. `None` when the reply carried no usable `T:` value.
    pub fn poll_once(
        &self,
        session: &SharedSession,
    ) -> Result<Option<TemperatureReport>, CalibrationError> {
        match session.exchange(|driver| query_temperatures(driver, self.policy)) {
            Ok(report) => Ok(Some(report)),
            Err(CalibrationError::TemperatureUnavailable) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Poll until `on_reading` breaks or `cancel` fires.
    ///
    /// The session lock is released between polls. A closed session or a
    /// transport failure ends the loop with an error.
    pub fn run(
        &self,
        session: &SharedSession,
        clock: &dyn Clock,
        cancel: &CancelToken,
        mut on_reading: impl FnMut(Option<TemperatureReport>) -> ControlFlow<()>,
    ) -> Result<(), CalibrationError> {
        tracing::info!(
            "Monitoring temperature on {} every {:?}",
            session.port_id(),
            self.interval
        );
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let reading = self.poll_once(session)?;
            if on_reading(reading).is_break() {
                return Ok(());
            }
            clock.sleep(self.interval);
        }
    }
}
