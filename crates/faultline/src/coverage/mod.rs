//! Per-test-case line coverage.
//!
//! The instrumented `coverage_runner` replays a test case's inputs without
//! the IPC handshake:
//!
//! ```text
//! coverage_runner <test-case-dir> <iterations> [per-iteration-limit-secs]
//! ```
//!
//! | exit | meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | all iterations replayed                   |
//! | 1    | usage or input file error                 |
//! | 2    | watchdog fired, counters flushed          |
//! | 3    | safety-net kill                           |
//!
//! Any exit still leaves partial `.gcda` counters behind, so coverage is
//! parsed regardless.

mod collector;

pub use collector::{CoverageCollector, CoverageConfig, DEFAULT_COVERAGE_TIMEOUT_MS, DEFAULT_GCOV_TIMEOUT_MS};

use crate::command::CommandOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// How the coverage runner finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageRunExit {
    Completed,
    UsageError,
    WatchdogFired,
    SafetyKill,
    /// Undocumented exit code
    Other(i32),
    /// Killed by a signal
    Signaled(i32),
    /// Killed after the overall subprocess timeout
    TimedOut,
}

impl CoverageRunExit {
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Completed,
            1 => Self::UsageError,
            2 => Self::WatchdogFired,
            3 => Self::SafetyKill,
            other => Self::Other(other),
        }
    }

    pub(crate) const fn from_output(output: &CommandOutput) -> Self {
        if output.timed_out {
            return Self::TimedOut;
        }
        match (output.exit.code, output.exit.signal) {
            (Some(code), _) => Self::from_code(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Other(-1),
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for CoverageRunExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::UsageError => write!(f, "usage or input error (exit 1)"),
            Self::WatchdogFired => write!(f, "watchdog fired (exit 2)"),
            Self::SafetyKill => write!(f, "safety-net kill (exit 3)"),
            Self::Other(code) => write!(f, "exit code {code}"),
            Self::Signaled(signal) => write!(f, "signal {signal}"),
            Self::TimedOut => write!(f, "killed after timeout"),
        }
    }
}

/// Coverage gathered for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub name: String,
    pub runner_exit: CoverageRunExit,
    pub covered_lines: BTreeSet<u32>,
    /// A gcov report was produced
    pub report_found: bool,
}
