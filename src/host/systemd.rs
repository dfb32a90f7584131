//! systemd backed service manager.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::CharmError;
use crate::executor::SubprocessBuilder;

use super::traits::ServiceManager;

/// Service manager driving systemctl.
pub struct SystemdServiceManager {
    timeout: Duration,
}

impl SystemdServiceManager {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn systemctl(&self, action: &str, unit: &str) -> Result<(), CharmError> {
        debug!(unit = %unit, action = %action, "Running systemctl");

        SubprocessBuilder::new("systemctl")
            .args([action, unit])
            .timeout(self.timeout)
            .check()
            .map_err(|e| e.into_service(unit))?;

        info!(unit = %unit, action = %action, "Service action completed");
        Ok(())
    }
}

impl ServiceManager for SystemdServiceManager {
    fn is_running(&mut self, unit: &str) -> Result<bool, CharmError> {
        // is-active exits non-zero for every state other than "active"
        let result = SubprocessBuilder::new("systemctl")
            .args(["is-active", "--quiet", unit])
            .timeout(self.timeout)
            .run()
            .map_err(|e| e.into_service(unit))?;
        Ok(result.success)
    }

    fn start(&mut self, unit: &str) -> Result<(), CharmError> {
        self.systemctl("start", unit)
    }

    fn restart(&mut self, unit: &str) -> Result<(), CharmError> {
        self.systemctl("restart", unit)
    }

    fn stop(&mut self, unit: &str) -> Result<(), CharmError> {
        self.systemctl("stop", unit)
    }
}
