//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains:
//! - The execution logic for a CLI command
//! - Pure helper functions
//! - Tests

pub mod gcov;
pub mod inspect;
pub mod localize;
pub mod validate;

pub use gcov::{execute_gcov, summarize_report, GcovSummary};
pub use inspect::{execute_inspect, guess_kind, DecodedBuffer};
pub use localize::{execute_localize, localize_session_config, render_report};
pub use validate::{execute_validate, validate_runner_config, ValidationSummary};

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Working directory for one command run.
///
/// A directory the user named is kept; a generated one is removed on drop
/// unless `keep` is set.
#[derive(Debug)]
pub enum Workdir {
    /// Named on the command line
    Requested(PathBuf),
    /// Generated, removed on drop
    Temporary(TempDir),
    /// Generated, left behind for inspection
    Kept(PathBuf),
}

impl Workdir {
    /// Use `requested` or create a fresh `faultline-*` directory under the
    /// system temp dir
    pub fn resolve(requested: Option<&Path>, keep: bool) -> CliResult<Self> {
        if let Some(path) = requested {
            std::fs::create_dir_all(path)?;
            return Ok(Self::Requested(path.to_path_buf()));
        }
        let dir = tempfile::Builder::new().prefix("faultline-").tempdir()?;
        Ok(if keep {
            Self::Kept(dir.keep())
        } else {
            Self::Temporary(dir)
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Requested(path) | Self::Kept(path) => path,
            Self::Temporary(dir) => dir.path(),
        }
    }

    /// Whether the directory is removed on drop
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

/// Reporter honoring the configured color and quiet settings
#[must_use]
pub fn reporter_for(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

/// Pretty-print a value as JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
