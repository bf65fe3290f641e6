//! Faultline CLI: fault localization for native controllers
//!
//! ## Usage
//!
//! ```bash
//! faultline localize --source controller.c --header controller.h \
//!     --driver test_driver.cpp --coverage-driver coverage_driver.cpp \
//!     --test-dir tests                       # Rank suspicious lines
//! faultline validate --controller ./controller --test-dir tests
//! faultline inspect tests/n1/t1              # Decode a state buffer
//! faultline gcov controller.c.gcov --lines   # Summarize a gcov report
//! ```

use clap::Parser;
use faultline_cli::handlers::{execute_gcov, execute_inspect, execute_localize, execute_validate};
use faultline_cli::{Cli, CliConfig, CliResult, ColorChoice, Commands, Verbosity};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    init_tracing(config.verbosity);

    match cli.command {
        Commands::Localize(args) => execute_localize(&config, &args),
        Commands::Validate(args) => execute_validate(&config, &args),
        Commands::Inspect(args) => execute_inspect(&config, &args),
        Commands::Gcov(args) => execute_gcov(&config, &args),
    }
}

/// Defaults, then the `--config` file, then global flags
fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color));
    match cli.config {
        Some(ref path) => config.with_session_file(path),
        None => Ok(config),
    }
}

/// Logs go to stderr so JSON on stdout stays clean; `RUST_LOG` wins
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
