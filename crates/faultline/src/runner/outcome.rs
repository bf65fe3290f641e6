//! Terminal outcomes of a test case run.

use super::validate::Verdict;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Which handshake wait timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutPhase {
    /// Waiting for the controller to accept new input
    ReadyForInput,
    /// Waiting for the controller to finish processing
    Processing,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadyForInput => write!(f, "waiting for controller to be ready"),
            Self::Processing => write!(f, "waiting for controller response"),
        }
    }
}

/// How a controller process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    #[must_use]
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Why the controller never became ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupFailure {
    /// The process exited before creating the sentinel
    Exited(ExitInfo),
    /// No sentinel within the startup timeout
    TimedOut,
    /// The executable could not be launched
    Spawn(String),
}

impl fmt::Display for StartupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(exit) => write!(f, "controller exited during startup ({exit})"),
            Self::TimedOut => write!(f, "controller startup timed out"),
            Self::Spawn(message) => write!(f, "controller could not be launched: {message}"),
        }
    }
}

/// Exactly one terminal outcome per test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Passed,
    FailedValidation {
        iteration: usize,
        reason: String,
    },
    ControllerStartupFailed {
        reason: StartupFailure,
    },
    ControllerCrashed {
        iteration: usize,
        exit: ExitInfo,
    },
    Timeout {
        iteration: usize,
        phase: TimeoutPhase,
    },
    InputOrOracleMissing {
        iteration: usize,
        path: PathBuf,
    },
    /// Controller output or oracle could not be decoded
    DecodeFailed {
        iteration: usize,
        message: String,
    },
    /// Reading or writing an IPC buffer failed
    IpcFailure {
        iteration: usize,
        message: String,
    },
}

impl Outcome {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Iteration the test case stopped at; 0 for startup failures
    #[must_use]
    pub const fn iteration(&self) -> Option<usize> {
        match self {
            Self::Passed => None,
            Self::ControllerStartupFailed { .. } => Some(0),
            Self::FailedValidation { iteration, .. }
            | Self::ControllerCrashed { iteration, .. }
            | Self::Timeout { iteration, .. }
            | Self::InputOrOracleMissing { iteration, .. }
            | Self::DecodeFailed { iteration, .. }
            | Self::IpcFailure { iteration, .. } => Some(*iteration),
        }
    }

    /// Whether the failure is the controller's semantics rather than
    /// infrastructure (crash and timeout count as semantic: the program hung
    /// or died on that input)
    #[must_use]
    pub const fn is_infrastructure_failure(&self) -> bool {
        matches!(
            self,
            Self::ControllerStartupFailed { .. }
                | Self::InputOrOracleMissing { .. }
                | Self::DecodeFailed { .. }
                | Self::IpcFailure { .. }
        )
    }

    /// Human-readable reason; `None` for a pass
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Passed => None,
            Self::FailedValidation { reason, .. } => Some(reason.clone()),
            Self::ControllerStartupFailed { reason } => Some(reason.to_string()),
            Self::ControllerCrashed { exit, .. } => {
                Some(format!("controller crashed during iteration ({exit})"))
            }
            Self::Timeout { phase, .. } => Some(format!("timeout {phase}")),
            Self::InputOrOracleMissing { path, .. } => {
                Some(format!("file not found: {}", path.display()))
            }
            Self::DecodeFailed { message, .. } => Some(format!("decode error: {message}")),
            Self::IpcFailure { message, .. } => Some(format!("IPC error: {message}")),
        }
    }
}

/// Result of a single iteration that reached validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub iteration: usize,
    pub verdict: Verdict,
    pub duration: Duration,
}

impl IterationResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.verdict.passed
    }
}

/// Result of running one test case through the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub name: String,
    pub outcome: Outcome,
    /// Iterations started, including the one that failed
    pub iterations_run: usize,
    pub iterations_total: usize,
    pub iteration_results: Vec<IterationResult>,
    pub duration: Duration,
}

impl TestCaseResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.outcome.is_pass()
    }

    /// 1-based failing iteration, 0 when the controller never started
    #[must_use]
    pub const fn failed_at_iteration(&self) -> Option<usize> {
        self.outcome.iteration()
    }

    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        self.outcome.reason()
    }
}

impl fmt::Display for TestCaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.failed_at_iteration(), self.failure_reason()) {
            (Some(iteration), Some(reason)) => {
                write!(f, "{}: FAIL at iteration {iteration} - {reason}", self.name)
            }
            _ => write!(
                f,
                "{}: PASS ({}/{} iterations)",
                self.name, self.iterations_run, self.iterations_total
            ),
        }
    }
}
