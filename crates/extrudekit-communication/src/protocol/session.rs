//! Shared handle to the live session

use super::{CollectionPolicy, CommandChannel, ProtocolDriver, Response};
use extrudekit_core::Command;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to one [`ProtocolDriver`].
///
/// Every exchange takes the lock for its whole duration, so inventory
/// refreshes, calibration steps and manual sends never interleave reads.
#[derive(Clone)]
pub struct SharedSession {
    driver: Arc<Mutex<ProtocolDriver>>,
    port_id: String,
}

impl SharedSession {
    /// Take ownership of a driver
    pub fn new(driver: ProtocolDriver) -> Self {
        let port_id = driver.port_name().to_string();
        Self {
            driver: Arc::new(Mutex::new(driver)),
            port_id,
        }
    }

    /// Port the session was opened on
    pub fn port_id(&self) -> &str {
        &self.port_id
    }

    /// Run `f` with exclusive access to the driver
    pub fn exchange<R>(&self, f: impl FnOnce(&mut ProtocolDriver) -> R) -> R {
        let mut driver = self.driver.lock();
        f(&mut driver)
    }

    /// Send `command` and collect its reply under one lock
    pub fn call(&self, command: &Command, policy: CollectionPolicy) -> Response {
        self.exchange(|driver| driver.call(command, policy))
    }

    /// Whether the transport is still attached
    pub fn is_open(&self) -> bool {
        self.exchange(|driver| driver.is_open())
    }

    /// Close the transport for every holder of this handle
    pub fn disconnect(&self) -> bool {
        self.exchange(|driver| driver.disconnect())
    }
}

impl std::fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSession")
            .field("port_id", &self.port_id)
            .finish()
    }
}
