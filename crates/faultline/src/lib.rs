//! Faultline: spectrum-based fault localization for native controllers.
//!
//! A controller is an external process that consumes a fixed-layout input
//! buffer and answers with a fixed-layout output buffer, one iteration at a
//! time. Faultline drives it through recorded test cases, collects per-line
//! coverage from an instrumented build, and ranks source lines by how
//! strongly their execution correlates with failing test cases.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         session                                  │
//! │   toolchain ──► coverage ──► gcov ──┐                            │
//! │                                     ├──► sbfl ──► ranking        │
//! │   toolchain ──► runner ──► codec ───┘    (verdicts overwrite     │
//! │                  │                        naming-convention      │
//! │                  └─ _state / _data / _flag  hints)               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use faultline::{Metric, Session, SessionConfig, SessionSources};
//! use std::path::Path;
//!
//! let sources = SessionSources {
//!     source: "controller.c".into(),
//!     header: "controller.h".into(),
//!     driver: "test_driver.cpp".into(),
//!     coverage_driver: "coverage_driver.cpp".into(),
//! };
//! let config = SessionConfig::new().with_metric(Metric::Ochiai);
//! let session = Session::prepare(&sources, Path::new("tests"), Path::new("/tmp/fl"), config)?;
//! let report = session.localize()?;
//! for score in &report.ranking {
//!     println!("line {}: {:.4}", score.line, score.score);
//! }
//! # Ok::<(), faultline::FaultlineError>(())
//! ```

#![cfg_attr(test, allow(clippy::float_cmp))]

/// Fixed-layout protocol buffers exchanged with the controller
pub mod codec;

/// Per-test-case coverage from the instrumented replay runner
pub mod coverage;

/// gcov text report parsing
pub mod gcov;

/// Controller process and IPC test runner
pub mod runner;

/// Suspiciousness metrics and ranking
pub mod sbfl;

/// End-to-end localization and repair sessions
pub mod session;

/// C/C++ build steps
pub mod toolchain;

/// Bounded polling
pub mod wait;

mod command;
mod result;

pub use command::CommandOutput;
pub use coverage::{CoverageCollector, CoverageConfig, CoverageRecord, CoverageRunExit};
pub use gcov::{GcovLine, GcovReport};
pub use result::{FaultlineError, FaultlineResult};
pub use runner::{
    NamingConvention, Outcome, RunnerConfig, TestCase, TestCaseResult, TestRunner, TimeoutPhase,
    Verdict,
};
pub use sbfl::{format_ranking, CoverageMatrix, Metric, SbflLocalizer, SuspiciousnessScore};
pub use session::{
    CandidateEvaluation, LocalizationReport, RepairAttempt, RepairContext, RepairOutcome,
    RepairStrategy, Session, SessionConfig, SessionEvent, SessionSources,
};
pub use toolchain::{Toolchain, ToolchainConfig};
