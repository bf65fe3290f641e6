//! One localization and repair session.
//!
//! A session owns a private working directory; the user's files are copied
//! in and never touched again:
//!
//! ```text
//! workdir/
//! ├── controller.h          header, one level above the sources
//! ├── source/
//! │   ├── controller.c
//! │   ├── test_driver.cpp
//! │   ├── coverage_driver.cpp
//! │   └── ... objects, executables, gcov artifacts
//! └── run/                  controller cwd: IPC files, controller.log
//! ```
//!
//! [`Session::localize`] ranks lines; [`Session::repair`] feeds the ranking
//! to a pluggable [`RepairStrategy`] and re-tests each candidate.

use crate::codec::{format_state_text, read_state_file};
use crate::coverage::{CoverageCollector, CoverageConfig, CoverageRecord};
use crate::result::{FaultlineError, FaultlineResult};
use crate::runner::{NamingConvention, RunnerConfig, TestCase, TestCaseResult, TestRunner};
use crate::sbfl::{Metric, SbflLocalizer, SuspiciousnessScore};
use crate::toolchain::{Toolchain, ToolchainConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Subdirectory holding the sources and build artifacts
pub const SOURCE_DIR: &str = "source";
/// Subdirectory the controller runs in
pub const RUN_DIR: &str = "run";

/// Everything a session can be configured with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub runner: RunnerConfig,
    pub coverage: CoverageConfig,
    pub toolchain: ToolchainConfig,
    pub naming: NamingConvention,
    pub metric: Metric,
    /// Keep only the most suspicious lines
    pub top_n: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            coverage: CoverageConfig::default(),
            toolchain: ToolchainConfig::default(),
            naming: NamingConvention::default(),
            metric: Metric::default(),
            top_n: Some(10),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_runner(mut self, runner: RunnerConfig) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_coverage(mut self, coverage: CoverageConfig) -> Self {
        self.coverage = coverage;
        self
    }

    #[must_use]
    pub fn with_toolchain(mut self, toolchain: ToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    #[must_use]
    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    #[must_use]
    pub const fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub const fn with_top_n(mut self, top_n: Option<usize>) -> Self {
        self.top_n = top_n;
        self
    }
}

/// The user's input files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSources {
    /// Controller C source
    pub source: PathBuf,
    pub header: PathBuf,
    /// C++ IPC driver for the validation build
    pub driver: PathBuf,
    /// C++ replay driver for the coverage build
    pub coverage_driver: PathBuf,
}

/// Pipeline stage, reported through [`SessionEvent::Phase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CoverageBuild,
    CoverageCollection,
    ValidationBuild,
    Validation,
    Ranking,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CoverageBuild => "building coverage runner",
            Self::CoverageCollection => "collecting coverage",
            Self::ValidationBuild => "building controller",
            Self::Validation => "running test cases",
            Self::Ranking => "ranking lines",
        };
        f.write_str(name)
    }
}

/// Progress notifications from [`Session::localize_with`]
#[derive(Debug, Clone, Copy)]
pub enum SessionEvent<'a> {
    Phase(Phase),
    Coverage(&'a CoverageRecord),
    TestCase(&'a TestCaseResult),
}

/// Result of [`Session::localize`]
#[derive(Debug, Clone, Serialize)]
pub struct LocalizationReport {
    pub metric: Metric,
    pub ranking: Vec<SuspiciousnessScore>,
    pub results: Vec<TestCaseResult>,
    pub coverage: Vec<CoverageRecord>,
    /// Test cases failing under the authoritative verdict
    pub failing: Vec<String>,
    pub passing: Vec<String>,
}

impl LocalizationReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failing.is_empty()
    }
}

/// Result of building and testing one candidate source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateEvaluation {
    BuildFailed { diagnostic: String },
    Tested { results: Vec<TestCaseResult> },
}

impl CandidateEvaluation {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        match self {
            Self::BuildFailed { .. } => false,
            Self::Tested { results } => results.iter().all(TestCaseResult::passed),
        }
    }
}

/// One candidate tried by [`Session::repair`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt: usize,
    pub candidate: String,
    pub evaluation: CandidateEvaluation,
}

/// What a repair strategy gets to look at
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    pub source_name: &'a str,
    pub original_source: &'a str,
    pub header_name: &'a str,
    pub header_source: &'a str,
    pub ranking: &'a [SuspiciousnessScore],
    /// Verdicts of the unmodified controller
    pub results: &'a [TestCaseResult],
    /// Decoded input of the first failing iteration
    pub failing_input: Option<&'a str>,
    pub previous_attempts: &'a [RepairAttempt],
}

/// Produces candidate sources
pub trait RepairStrategy {
    /// Propose a full replacement for the controller source, or `None` to
    /// skip this attempt
    fn propose(&mut self, context: &RepairContext<'_>) -> Option<String>;
}

/// How [`Session::repair`] ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RepairOutcome {
    /// Nothing to repair
    AlreadyPassing,
    Repaired {
        attempt: usize,
        source: String,
        results: Vec<TestCaseResult>,
    },
    Exhausted { attempts: Vec<RepairAttempt> },
}

/// A prepared working directory plus its discovered test cases
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    workdir: PathBuf,
    source_name: String,
    driver_name: String,
    coverage_driver_name: String,
    header_name: String,
    original_source: String,
    header_source: String,
    test_cases: Vec<TestCase>,
    toolchain: Toolchain,
}

impl Session {
    /// Copy the inputs into `workdir` and discover test cases.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a missing input file or an empty test
    /// directory abort the session.
    pub fn prepare(
        sources: &SessionSources,
        test_dir: &Path,
        workdir: &Path,
        config: SessionConfig,
    ) -> FaultlineResult<Self> {
        config.runner.validate()?;
        for (label, path) in [
            ("source", &sources.source),
            ("header", &sources.header),
            ("driver", &sources.driver),
            ("coverage driver", &sources.coverage_driver),
        ] {
            if !path.is_file() {
                return Err(FaultlineError::session(format!(
                    "{label} file not found: {}",
                    path.display()
                )));
            }
        }

        std::fs::create_dir_all(workdir)?;
        // Builds and runs change directory into the workdir
        let workdir = workdir.canonicalize()?;
        let source_dir = workdir.join(SOURCE_DIR);
        std::fs::create_dir_all(&source_dir)?;
        std::fs::create_dir_all(workdir.join(RUN_DIR))?;
        let header_name = copy_into(&sources.header, &workdir)?;
        let source_name = copy_into(&sources.source, &source_dir)?;
        let driver_name = copy_into(&sources.driver, &source_dir)?;
        let coverage_driver_name = copy_into(&sources.coverage_driver, &source_dir)?;

        let test_cases = TestCase::discover(test_dir, &config.naming)?;
        if test_cases.is_empty() {
            return Err(FaultlineError::session(format!(
                "no test cases found in {}",
                test_dir.display()
            )));
        }

        tracing::info!(
            workdir = %workdir.display(),
            test_cases = test_cases.len(),
            "session prepared"
        );
        Ok(Self {
            original_source: std::fs::read_to_string(source_dir.join(&source_name))?,
            header_source: std::fs::read_to_string(workdir.join(&header_name))?,
            toolchain: Toolchain::new(config.toolchain.clone()),
            config,
            workdir,
            source_name,
            driver_name,
            coverage_driver_name,
            header_name,
            test_cases,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.workdir.join(SOURCE_DIR)
    }

    #[must_use]
    pub fn run_dir(&self) -> PathBuf {
        self.workdir.join(RUN_DIR)
    }

    #[must_use]
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Coverage, authoritative verdicts and ranking for the original source
    ///
    /// # Errors
    ///
    /// Build failures of either executable abort the session, as does a
    /// runner or gcov that cannot be started.
    pub fn localize(&self) -> FaultlineResult<LocalizationReport> {
        self.localize_with(|_| {})
    }

    /// Like [`Self::localize`], with progress events
    pub fn localize_with(
        &self,
        mut on_event: impl FnMut(SessionEvent<'_>),
    ) -> FaultlineResult<LocalizationReport> {
        let source_dir = self.source_dir();

        on_event(SessionEvent::Phase(Phase::CoverageBuild));
        let coverage_runner = self.toolchain.build_coverage_runner(
            &source_dir,
            &self.source_name,
            &self.coverage_driver_name,
        )?;

        on_event(SessionEvent::Phase(Phase::CoverageCollection));
        let collector = CoverageCollector::new(
            coverage_runner,
            &source_dir,
            &self.source_name,
            self.config.coverage.clone(),
        );
        let mut coverage = Vec::with_capacity(self.test_cases.len());
        let mut matrix = collector.collect_with(&self.test_cases, |record| {
            on_event(SessionEvent::Coverage(record));
            coverage.push(record.clone());
        })?;

        on_event(SessionEvent::Phase(Phase::ValidationBuild));
        let controller =
            self.toolchain
                .build_controller(&source_dir, &self.source_name, &self.driver_name)?;

        on_event(SessionEvent::Phase(Phase::Validation));
        let runner = TestRunner::new(controller, self.run_dir(), self.config.runner.clone());
        let results = runner.run_all_with(&self.test_cases, |r| on_event(SessionEvent::TestCase(r)));
        for result in &results {
            if matrix.passed(&result.name) != Some(result.passed()) {
                tracing::info!(
                    test_case = %result.name,
                    passed = result.passed(),
                    "verdict differs from naming convention"
                );
            }
            matrix.set_result(&result.name, result.passed());
        }

        on_event(SessionEvent::Phase(Phase::Ranking));
        let source_lines = numbered_lines(&self.original_source);
        let ranking = SbflLocalizer::new(&matrix, self.config.metric)
            .with_source_lines(&source_lines)
            .rank_lines(self.config.top_n);

        let failing: Vec<String> = matrix.failing_tests().into_iter().map(String::from).collect();
        let passing: Vec<String> = matrix.passing_tests().into_iter().map(String::from).collect();
        tracing::info!(
            failing = failing.len(),
            passing = passing.len(),
            ranked = ranking.len(),
            "localization finished"
        );
        Ok(LocalizationReport {
            metric: self.config.metric,
            ranking,
            results,
            coverage,
            failing,
            passing,
        })
    }

    /// Build and test a candidate source in place of the original.
    ///
    /// The original source is restored afterward whatever happens.
    ///
    /// # Errors
    ///
    /// I/O problems in the workdir and compilers that cannot be started.
    /// Compile and link errors are a [`CandidateEvaluation::BuildFailed`].
    pub fn evaluate_candidate(&self, candidate: &str) -> FaultlineResult<CandidateEvaluation> {
        let source_path = self.source_dir().join(&self.source_name);
        std::fs::write(&source_path, candidate)?;
        let evaluation = self.build_and_test();
        std::fs::write(&source_path, &self.original_source)?;
        evaluation
    }

    fn build_and_test(&self) -> FaultlineResult<CandidateEvaluation> {
        let controller = match self.toolchain.build_controller(
            &self.source_dir(),
            &self.source_name,
            &self.driver_name,
        ) {
            Ok(path) => path,
            Err(FaultlineError::Build { stage, diagnostic }) => {
                tracing::info!(%stage, "candidate does not build");
                return Ok(CandidateEvaluation::BuildFailed { diagnostic });
            }
            Err(e) => return Err(e),
        };
        let runner = TestRunner::new(controller, self.run_dir(), self.config.runner.clone());
        Ok(CandidateEvaluation::Tested {
            results: runner.run_all(&self.test_cases),
        })
    }

    /// Decoded input of the first failing test case's failing iteration
    #[must_use]
    pub fn failing_input_text(&self, results: &[TestCaseResult]) -> Option<String> {
        let result = results.iter().find(|r| !r.passed())?;
        let iteration = result.failed_at_iteration().filter(|&i| i > 0)?;
        let case = self.test_cases.iter().find(|c| c.name == result.name)?;
        match read_state_file(&case.input_path(iteration)) {
            Ok(state) => Some(format!(
                "Test case {}, iteration {iteration}:\n{}",
                case.name,
                format_state_text(&state)
            )),
            Err(e) => {
                tracing::warn!(test_case = %case.name, iteration, error = %e, "failing input not decodable");
                None
            }
        }
    }

    /// Ask `strategy` for candidates until one passes every test case
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::evaluate_candidate`].
    pub fn repair(
        &self,
        report: &LocalizationReport,
        strategy: &mut dyn RepairStrategy,
        max_attempts: usize,
    ) -> FaultlineResult<RepairOutcome> {
        if report.all_passed() {
            return Ok(RepairOutcome::AlreadyPassing);
        }
        let failing_input = self.failing_input_text(&report.results);
        let mut attempts: Vec<RepairAttempt> = Vec::new();

        for attempt in 1..=max_attempts {
            let context = RepairContext {
                source_name: &self.source_name,
                original_source: &self.original_source,
                header_name: &self.header_name,
                header_source: &self.header_source,
                ranking: &report.ranking,
                results: &report.results,
                failing_input: failing_input.as_deref(),
                previous_attempts: &attempts,
            };
            let Some(candidate) = strategy.propose(&context) else {
                tracing::warn!(attempt, "no candidate proposed");
                continue;
            };

            tracing::info!(attempt, max_attempts, "evaluating candidate");
            let evaluation = self.evaluate_candidate(&candidate)?;
            if let CandidateEvaluation::Tested { results } = &evaluation {
                if results.iter().all(TestCaseResult::passed) {
                    tracing::info!(attempt, "repair found");
                    return Ok(RepairOutcome::Repaired {
                        attempt,
                        source: candidate,
                        results: results.clone(),
                    });
                }
            }
            attempts.push(RepairAttempt {
                attempt,
                candidate,
                evaluation,
            });
        }
        Ok(RepairOutcome::Exhausted { attempts })
    }
}

/// Copy `file` into `dir`, keeping its name
fn copy_into(file: &Path, dir: &Path) -> FaultlineResult<String> {
    let name = file
        .file_name()
        .ok_or_else(|| FaultlineError::session(format!("not a file: {}", file.display())))?
        .to_string_lossy()
        .into_owned();
    std::fs::copy(file, dir.join(&name))?;
    Ok(name)
}

/// 1-based line number to text
fn numbered_lines(source: &str) -> BTreeMap<u32, String> {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| (i as u32 + 1, line.to_string()))
        .collect()
}
