//! Faultline CLI Library
//!
//! Command-line interface for the Faultline fault localizer: argument
//! parsing, configuration layering, progress output and one handler per
//! subcommand.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    BufferKind, Cli, ColorArg, Commands, FormatArg, GcovArgs, InspectArgs, LocalizeArgs,
    ValidateArgs,
};
pub use config::{load_session_file, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, ProgressReporter};
