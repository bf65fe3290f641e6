//! Native build steps for the controller under test.
//!
//! Two executables are produced from the same C source:
//!
//! - `controller`: source + IPC driver, used for authoritative verdicts
//! - `coverage_runner`: source + replay driver, built with gcov
//!   instrumentation and used only to collect line coverage
//!
//! Each build compiles the C source and the C++ driver to objects in the
//! source directory and links them there. The first failing step aborts the
//! build with the compiler's diagnostic.

use crate::command::{run_bounded, CommandOutput};
use crate::result::{FaultlineError, FaultlineResult};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Name of the validation executable
pub const CONTROLLER_EXE: &str = "controller";
/// Name of the instrumented replay executable
pub const COVERAGE_RUNNER_EXE: &str = "coverage_runner";

/// gcov instrumentation flags
pub const COVERAGE_FLAGS: [&str; 2] = ["-fprofile-arcs", "-ftest-coverage"];
/// AddressSanitizer flags for the validation build
pub const SANITIZER_FLAGS: [&str; 2] = ["-fsanitize=address", "-fno-omit-frame-pointer"];

/// Default per-step timeout (60s)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 60_000;

/// Compilers and flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// C compiler
    pub cc: String,
    /// C++ compiler, also used to link
    pub cxx: String,
    /// Extra flags passed to every step
    pub extra_flags: Vec<String>,
    /// Build the validation controller with AddressSanitizer
    pub sanitize_address: bool,
    pub step_timeout_ms: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            extra_flags: Vec::new(),
            sanitize_address: false,
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }
}

impl ToolchainConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = cc.into();
        self
    }

    #[must_use]
    pub fn with_cxx(mut self, cxx: impl Into<String>) -> Self {
        self.cxx = cxx.into();
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.extra_flags.push(flag.into());
        self
    }

    #[must_use]
    pub const fn with_sanitizer(mut self, enabled: bool) -> Self {
        self.sanitize_address = enabled;
        self
    }

    #[must_use]
    pub const fn with_step_timeout(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }
}

/// Which executable a build produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildKind {
    Validation,
    Coverage,
}

impl BuildKind {
    const fn executable(self) -> &'static str {
        match self {
            Self::Validation => CONTROLLER_EXE,
            Self::Coverage => COVERAGE_RUNNER_EXE,
        }
    }
}

/// Builds controller executables
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    config: ToolchainConfig,
}

impl Toolchain {
    #[must_use]
    pub const fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Build `source_dir/controller` from the C source and the IPC driver.
    ///
    /// # Errors
    ///
    /// [`FaultlineError::Build`] with the compiler output when a step fails,
    /// [`FaultlineError::ToolLaunch`] when a compiler cannot be started.
    pub fn build_controller(
        &self,
        source_dir: &Path,
        source: &str,
        driver: &str,
    ) -> FaultlineResult<PathBuf> {
        self.build(BuildKind::Validation, source_dir, source, driver)
    }

    /// Build the gcov-instrumented `source_dir/coverage_runner`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_controller`].
    pub fn build_coverage_runner(
        &self,
        source_dir: &Path,
        source: &str,
        coverage_driver: &str,
    ) -> FaultlineResult<PathBuf> {
        self.build(BuildKind::Coverage, source_dir, source, coverage_driver)
    }

    fn flags(&self, kind: BuildKind) -> Vec<String> {
        let mut flags = self.config.extra_flags.clone();
        let extra: &[&str] = match kind {
            BuildKind::Coverage => &COVERAGE_FLAGS,
            BuildKind::Validation if self.config.sanitize_address => &SANITIZER_FLAGS,
            BuildKind::Validation => &[],
        };
        flags.extend(extra.iter().map(|f| (*f).to_string()));
        flags
    }

    fn build(
        &self,
        kind: BuildKind,
        source_dir: &Path,
        source: &str,
        driver: &str,
    ) -> FaultlineResult<PathBuf> {
        let flags = self.flags(kind);
        let c_obj = source_dir.join(object_name(source));
        let cxx_obj = source_dir.join(object_name(driver));
        let executable = source_dir.join(kind.executable());
        tracing::info!(
            executable = %executable.display(),
            flags = %flags.join(" "),
            "building"
        );

        let mut compile_c = Self::step_args(&flags);
        compile_c.extend(["-c".into(), source_dir.join(source).into(), "-o".into(), c_obj.clone().into()]);
        self.run_step("compile C source", &self.config.cc, compile_c)?;

        let mut compile_cxx = Self::step_args(&flags);
        compile_cxx.extend(["-c".into(), source_dir.join(driver).into(), "-o".into(), cxx_obj.clone().into()]);
        self.run_step("compile C++ driver", &self.config.cxx, compile_cxx)?;

        let mut link = Self::step_args(&flags);
        link.extend(["-o".into(), executable.clone().into(), cxx_obj.into(), c_obj.into()]);
        self.run_step("link", &self.config.cxx, link)?;

        Ok(executable)
    }

    fn step_args(flags: &[String]) -> Vec<OsString> {
        std::iter::once(OsString::from("-g"))
            .chain(flags.iter().map(OsString::from))
            .collect()
    }

    fn run_step(&self, stage: &str, program: &str, args: Vec<OsString>) -> FaultlineResult<CommandOutput> {
        tracing::debug!(stage, program, ?args, "toolchain step");
        let mut command = Command::new(program);
        command.args(&args);
        let output = run_bounded(&mut command, Duration::from_millis(self.config.step_timeout_ms))
            .map_err(|e| FaultlineError::tool_launch(program, e.to_string()))?;

        if output.timed_out {
            return Err(FaultlineError::build(stage, "timed out"));
        }
        if !output.success() {
            let diagnostic = output.diagnostic();
            tracing::warn!(stage, exit = %output.exit, "build step failed");
            return Err(FaultlineError::build(stage, diagnostic));
        }
        Ok(output)
    }
}

/// `controller.c` -> `controller.o`
fn object_name(file: &str) -> String {
    let stem = Path::new(file)
        .file_stem()
        .map_or_else(|| file.to_string(), |s| s.to_string_lossy().into_owned());
    format!("{stem}.o")
}
