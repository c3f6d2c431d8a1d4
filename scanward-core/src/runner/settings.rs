use std::time::Duration;

use crate::error::{CoreError, Result};

/// Knobs of the simulated check execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerSettings {
    /// Pause before each check.
    pub check_delay: Duration,
    /// Probability that a check cannot complete, which fails the whole scan.
    pub exception_rate: f64,
    /// Probability that a completed check passes.
    pub success_rate: f64,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            check_delay: Duration::from_secs(3),
            exception_rate: 0.05,
            success_rate: 0.8,
        }
    }
}

impl RunnerSettings {
    /// Settings that never sleep, never fail and always pass.
    pub fn deterministic() -> Self {
        Self {
            check_delay: Duration::ZERO,
            exception_rate: 0.0,
            success_rate: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, rate) in [
            ("exception_rate", self.exception_rate),
            ("success_rate", self.success_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(CoreError::InvalidInput(format!(
                    "{name} must lie in [0, 1] (got {rate})"
                )));
            }
        }
        Ok(())
    }
}
