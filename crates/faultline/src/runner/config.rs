//! Runner configuration

use crate::codec::layout::MAX_ARRAY_LEN;
use crate::result::{FaultlineError, FaultlineResult};
use crate::wait::{Poller, DEFAULT_POLL_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cosine-distance threshold for a passing iteration
pub const DEFAULT_EPSILON: f64 = 0.5;

/// Default time for the controller to signal readiness (10 seconds)
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;

/// Default time per handshake wait (5 seconds)
pub const DEFAULT_ITERATION_TIMEOUT_MS: u64 = 5_000;

/// Default grace period between SIGTERM and SIGKILL (2 seconds)
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 2_000;

/// Default number of joints compared per iteration
pub const DEFAULT_COMPARED_JOINTS: usize = 6;

/// Configuration for [`super::TestRunner`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum cosine distance for a passing iteration
    pub epsilon: f64,
    /// Startup timeout in milliseconds
    pub startup_timeout_ms: u64,
    /// Per-wait timeout in milliseconds
    pub iteration_timeout_ms: u64,
    /// Sentinel polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Grace period before force-killing the controller, in milliseconds
    pub terminate_grace_ms: u64,
    /// Leading position/velocity slots compared against the oracle
    pub compared_joints: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            iteration_timeout_ms: DEFAULT_ITERATION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
            compared_joints: DEFAULT_COMPARED_JOINTS,
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cosine-distance threshold
    #[must_use]
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the startup timeout in milliseconds
    #[must_use]
    pub const fn with_startup_timeout(mut self, ms: u64) -> Self {
        self.startup_timeout_ms = ms;
        self
    }

    /// Set the per-wait timeout in milliseconds
    #[must_use]
    pub const fn with_iteration_timeout(mut self, ms: u64) -> Self {
        self.iteration_timeout_ms = ms;
        self
    }

    /// Set the polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the terminate grace period in milliseconds
    #[must_use]
    pub const fn with_terminate_grace(mut self, ms: u64) -> Self {
        self.terminate_grace_ms = ms;
        self
    }

    /// Set the number of compared joints
    #[must_use]
    pub const fn with_compared_joints(mut self, joints: usize) -> Self {
        self.compared_joints = joints;
        self
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    /// Poller for the startup readiness wait
    #[must_use]
    pub const fn startup_poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.startup_timeout_ms),
            self.poll_interval(),
        )
    }

    /// Poller for the per-iteration handshake waits
    #[must_use]
    pub const fn iteration_poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.iteration_timeout_ms),
            self.poll_interval(),
        )
    }

    /// Reject values the runner cannot work with
    pub fn validate(&self) -> FaultlineResult<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(FaultlineError::config(format!(
                "epsilon must be a non-negative number, got {}",
                self.epsilon
            )));
        }
        if self.compared_joints == 0 || self.compared_joints > MAX_ARRAY_LEN {
            return Err(FaultlineError::config(format!(
                "compared_joints must be between 1 and {MAX_ARRAY_LEN}, got {}",
                self.compared_joints
            )));
        }
        if self.startup_timeout_ms == 0 || self.iteration_timeout_ms == 0 {
            return Err(FaultlineError::config("timeouts must be greater than zero"));
        }
        Ok(())
    }
}
