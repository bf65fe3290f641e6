//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use faultline::Metric;
use std::path::PathBuf;

/// Faultline: spectrum-based fault localization for native controllers
#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Session settings file (YAML); flags override its values
    #[arg(long, global = true, env = "FAULTLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build, collect coverage, validate and rank suspicious lines
    Localize(LocalizeArgs),

    /// Run test cases against a prebuilt controller
    Validate(ValidateArgs),

    /// Decode a state or vote buffer
    Inspect(InspectArgs),

    /// Summarize a gcov text report
    Gcov(GcovArgs),
}

/// Arguments for the localize command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct LocalizeArgs {
    /// Controller C source
    #[arg(long)]
    pub source: PathBuf,

    /// Header included by the controller source
    #[arg(long)]
    pub header: PathBuf,

    /// C++ IPC driver for the validation build
    #[arg(long)]
    pub driver: PathBuf,

    /// C++ replay driver for the coverage build
    #[arg(long)]
    pub coverage_driver: PathBuf,

    /// Directory holding one sub-directory per test case
    #[arg(long)]
    pub test_dir: PathBuf,

    /// Suspiciousness metric (ochiai, tarantula, jaccard, dstar[N])
    #[arg(short, long, value_parser = parse_metric)]
    pub metric: Option<Metric>,

    /// Number of lines to report
    #[arg(short = 'n', long, conflicts_with = "all")]
    pub top: Option<usize>,

    /// Report every covered line
    #[arg(long)]
    pub all: bool,

    /// Maximum cosine distance for a passing iteration
    #[arg(short, long)]
    pub epsilon: Option<f64>,

    /// Working directory (defaults to a fresh temporary directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Keep the working directory after the run
    #[arg(long)]
    pub keep_workdir: bool,

    /// Build with AddressSanitizer
    #[arg(long)]
    pub asan: bool,

    /// Per-iteration watchdog limit for the coverage runner, in seconds
    #[arg(long)]
    pub iteration_limit: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Prebuilt controller executable
    #[arg(long)]
    pub controller: PathBuf,

    /// Directory holding one sub-directory per test case
    #[arg(long)]
    pub test_dir: PathBuf,

    /// Maximum cosine distance for a passing iteration
    #[arg(short, long)]
    pub epsilon: Option<f64>,

    /// Directory the controller runs in (defaults to a temporary directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Buffer file to decode
    pub file: PathBuf,

    /// Structure to decode (guessed from the file size when omitted)
    #[arg(short, long)]
    pub kind: Option<BufferKind>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the gcov command
#[derive(Parser, Debug)]
pub struct GcovArgs {
    /// gcov text report
    pub report: PathBuf,

    /// List executed line numbers
    #[arg(short, long)]
    pub lines: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Protocol structure stored in a buffer file
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Request buffer written to the controller
    State,
    /// Response buffer read back from the controller
    Vote,
}

/// Output format argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    s.parse()
}
