use super::{CoverageRecord, CoverageRunExit};
use crate::command::run_bounded;
use crate::gcov::GcovReport;
use crate::result::{FaultlineError, FaultlineResult};
use crate::runner::TestCase;
use crate::sbfl::CoverageMatrix;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Default bound on one coverage runner invocation (60s)
pub const DEFAULT_COVERAGE_TIMEOUT_MS: u64 = 60_000;
/// Default bound on one gcov invocation (30s)
pub const DEFAULT_GCOV_TIMEOUT_MS: u64 = 30_000;

/// Coverage collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Per-iteration limit handed to the runner's own watchdog
    pub iteration_limit_secs: Option<u64>,
    /// Overall bound on the runner subprocess
    pub timeout_ms: u64,
    /// Report generator program
    pub gcov_command: String,
    pub gcov_timeout_ms: u64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            iteration_limit_secs: None,
            timeout_ms: DEFAULT_COVERAGE_TIMEOUT_MS,
            gcov_command: "gcov".to_string(),
            gcov_timeout_ms: DEFAULT_GCOV_TIMEOUT_MS,
        }
    }
}

impl CoverageConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_iteration_limit(mut self, secs: u64) -> Self {
        self.iteration_limit_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_gcov_command(mut self, command: impl Into<String>) -> Self {
        self.gcov_command = command.into();
        self
    }
}

/// Runs the instrumented runner once per test case and reads back gcov
/// line coverage.
///
/// All artifacts live in `source_dir`, next to the instrumented objects.
#[derive(Debug, Clone)]
pub struct CoverageCollector {
    runner: PathBuf,
    source_dir: PathBuf,
    source_name: String,
    config: CoverageConfig,
}

impl CoverageCollector {
    #[must_use]
    pub fn new(
        runner: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        source_name: impl Into<String>,
        config: CoverageConfig,
    ) -> Self {
        Self {
            runner: runner.into(),
            source_dir: source_dir.into(),
            source_name: source_name.into(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CoverageConfig {
        &self.config
    }

    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Path of the report gcov writes for the source
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.source_dir.join(format!("{}.gcov", self.source_name))
    }

    /// Collect coverage for every test case.
    ///
    /// Verdicts in the matrix start from each test case's naming-convention
    /// hint.
    ///
    /// # Errors
    ///
    /// Fails only when the runner or gcov cannot be started at all.
    pub fn collect(&self, cases: &[TestCase]) -> FaultlineResult<CoverageMatrix> {
        self.collect_with(cases, |_| {})
    }

    /// Like [`Self::collect`], reporting each record as it lands
    pub fn collect_with(
        &self,
        cases: &[TestCase],
        mut on_record: impl FnMut(&CoverageRecord),
    ) -> FaultlineResult<CoverageMatrix> {
        let mut matrix = CoverageMatrix::new();
        for case in cases {
            let record = self.run_test_case(case)?;
            on_record(&record);
            matrix.add_test_case(&record.name, record.covered_lines, case.expected_outcome);
        }
        tracing::info!(
            test_cases = matrix.len(),
            lines = matrix.all_lines().len(),
            "coverage collected"
        );
        Ok(matrix)
    }

    /// Clean stale counters, replay one test case, parse its report.
    ///
    /// The runner starts inside the source directory, so its own path and
    /// the test case path are resolved first.
    pub fn run_test_case(&self, case: &TestCase) -> FaultlineResult<CoverageRecord> {
        let removed = self.clean_artifacts()?;
        tracing::debug!(test_case = %case.name, removed, "cleaned coverage artifacts");

        let runner = self
            .runner
            .canonicalize()
            .map_err(|e| FaultlineError::tool_launch(self.runner.display().to_string(), e.to_string()))?;
        let case_path = case.path.canonicalize()?;
        let mut command = Command::new(&runner);
        command
            .current_dir(&self.source_dir)
            .arg(&case_path)
            .arg(case.iteration_count.to_string());
        if let Some(limit) = self.config.iteration_limit_secs {
            command.arg(limit.to_string());
        }
        let output = run_bounded(&mut command, Duration::from_millis(self.config.timeout_ms))
            .map_err(|e| FaultlineError::tool_launch(runner.display().to_string(), e.to_string()))?;

        let runner_exit = CoverageRunExit::from_output(&output);
        if runner_exit.is_complete() {
            tracing::debug!(test_case = %case.name, "coverage runner completed");
        } else {
            tracing::warn!(test_case = %case.name, exit = %runner_exit, "coverage runner did not complete");
        }

        let report = self.generate_report()?;
        let report_found = report.is_some();
        let covered_lines = report.map(|r| r.executed_lines()).unwrap_or_default();
        tracing::info!(test_case = %case.name, covered = covered_lines.len(), "coverage");

        Ok(CoverageRecord {
            name: case.name.clone(),
            runner_exit,
            covered_lines,
            report_found,
        })
    }

    /// Remove `*.gcda` and `*.gcov` from the source directory
    pub fn clean_artifacts(&self) -> FaultlineResult<usize> {
        let mut removed = 0;
        for pattern in ["*.gcda", "*.gcov"] {
            let pattern = self.source_dir.join(pattern);
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern)
                .map_err(|e| FaultlineError::coverage(format!("bad glob {pattern}: {e}")))?;
            for path in paths.flatten() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Run gcov for the source; `None` when no report appears
    fn generate_report(&self) -> FaultlineResult<Option<GcovReport>> {
        let mut command = Command::new(&self.config.gcov_command);
        command.current_dir(&self.source_dir).arg(&self.source_name);
        let output = run_bounded(&mut command, Duration::from_millis(self.config.gcov_timeout_ms))
            .map_err(|e| FaultlineError::tool_launch(&self.config.gcov_command, e.to_string()))?;
        if !output.success() {
            tracing::warn!(exit = %output.exit, diagnostic = %output.diagnostic(), "gcov failed");
        }

        let path = self.report_path();
        if path.is_file() {
            GcovReport::from_file(&path).map(Some)
        } else {
            tracing::warn!(report = %path.display(), "no gcov report generated");
            Ok(None)
        }
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    const REPORT_N1: &str = "        -:    0:Source:controller.c
        -:    1:#include \"controller.h\"
        5:    2:int step(int x) {
        5:    3:    if (x > 0)
        3:    4:        return x - 1;
    #####:    5:    return x;
        -:    6:}
";

    const REPORT_P1: &str = "        -:    0:Source:controller.c
        -:    1:#include \"controller.h\"
        2:    2:int step(int x) {
        2:    3:    if (x > 0)
    #####:    4:        return x - 1;
        2:    5:    return x;
        -:    6:}
";

    struct Fixture {
        _dir: tempfile::TempDir,
        source_dir: PathBuf,
        tests: PathBuf,
    }

    impl Fixture {
        /// Fake runner logs its argv and names the replayed case; fake gcov
        /// copies the canned report for that case, if any.
        fn new(runner_exit: i32) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let source_dir = dir.path().join("source");
            let tests = dir.path().join("tests");
            fs::create_dir_all(source_dir.join("reports")).unwrap();
            fs::create_dir_all(&tests).unwrap();
            fs::write(source_dir.join("reports/n1.gcov"), REPORT_N1).unwrap();
            fs::write(source_dir.join("reports/p1.gcov"), REPORT_P1).unwrap();

            script(
                &source_dir.join("coverage_runner"),
                &format!(
                    "echo \"$*\" >> runs.log\nbasename \"$1\" > last_case\ntouch controller.gcda\nexit {runner_exit}"
                ),
            );
            script(
                &source_dir.join("fake_gcov"),
                "case=$(cat last_case)\n[ -f \"reports/$case.gcov\" ] && cp \"reports/$case.gcov\" \"$1.gcov\"\nexit 0",
            );
            Self {
                _dir: dir,
                source_dir,
                tests,
            }
        }

        fn case(&self, name: &str, iterations: usize) -> TestCase {
            let dir = self.tests.join(name);
            fs::create_dir_all(&dir).unwrap();
            for i in 1..=iterations {
                fs::write(dir.join(format!("t{i}")), b"input").unwrap();
            }
            TestCase::from_directory(&dir, name.starts_with('p')).unwrap()
        }

        fn collector(&self, config: CoverageConfig) -> CoverageCollector {
            CoverageCollector::new(
                self.source_dir.join("coverage_runner"),
                &self.source_dir,
                "controller.c",
                config.with_gcov_command(self.source_dir.join("fake_gcov").display().to_string()),
            )
        }
    }

    fn script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_collect_builds_matrix_from_hints() {
        let fx = Fixture::new(0);
        let cases = vec![fx.case("n1", 3), fx.case("p1", 2)];
        let matrix = fx.collector(CoverageConfig::new()).collect(&cases).unwrap();

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.passed("n1"), Some(false));
        assert_eq!(matrix.passed("p1"), Some(true));
        assert_eq!(
            matrix.covered_lines("n1").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(
            matrix.covered_lines("p1").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![2, 3, 5]
        );
    }

    #[test]
    fn test_runner_arguments() {
        let fx = Fixture::new(0);
        let case = fx.case("n1", 3);
        fx.collector(CoverageConfig::new().with_iteration_limit(2))
            .run_test_case(&case)
            .unwrap();
        let log = fs::read_to_string(fx.source_dir.join("runs.log")).unwrap();
        assert_eq!(log.trim(), format!("{} 3 2", case.path.canonicalize().unwrap().display()));
    }

    #[test]
    fn test_relative_paths_resolved_before_chdir() {
        let fx = Fixture::new(0);
        script(
            &fx.source_dir.join("coverage_runner"),
            "[ -d \"$1\" ] || exit 1\nbasename \"$1\" > last_case\nexit 0",
        );
        let local = tempfile::tempdir_in(".").unwrap();
        let relative = Path::new(".").join(local.path().file_name().unwrap()).join("n1");
        fs::create_dir_all(&relative).unwrap();
        fs::write(relative.join("t1"), b"input").unwrap();
        let case = TestCase::from_directory(&relative, false).unwrap();
        assert!(case.path.is_relative());

        let record = fx.collector(CoverageConfig::new()).run_test_case(&case).unwrap();
        assert_eq!(record.runner_exit, CoverageRunExit::Completed);
        assert!(record.report_found);
        assert_eq!(record.covered_lines.len(), 3);
    }

    #[test]
    fn test_watchdog_exit_still_parses_coverage() {
        let fx = Fixture::new(2);
        let case = fx.case("n1", 1);
        let record = fx.collector(CoverageConfig::new()).run_test_case(&case).unwrap();
        assert_eq!(record.runner_exit, CoverageRunExit::WatchdogFired);
        assert!(record.report_found);
        assert_eq!(record.covered_lines.len(), 3);
    }

    #[test]
    fn test_stale_report_is_not_reused() {
        let fx = Fixture::new(0);
        let collector = fx.collector(CoverageConfig::new());
        collector.run_test_case(&fx.case("n1", 1)).unwrap();
        assert!(collector.report_path().exists());

        let record = collector.run_test_case(&fx.case("p9", 1)).unwrap();
        assert!(!record.report_found);
        assert!(record.covered_lines.is_empty());
    }

    #[test]
    fn test_clean_artifacts() {
        let fx = Fixture::new(0);
        fs::write(fx.source_dir.join("a.gcda"), b"").unwrap();
        fs::write(fx.source_dir.join("controller.c.gcov"), b"").unwrap();
        fs::write(fx.source_dir.join("controller.gcno"), b"").unwrap();
        let removed = fx.collector(CoverageConfig::new()).clean_artifacts().unwrap();
        assert_eq!(removed, 2);
        assert!(fx.source_dir.join("controller.gcno").exists());
        assert!(fx.source_dir.join("reports/n1.gcov").exists());
    }

    #[test]
    fn test_hanging_runner_is_bounded() {
        let fx = Fixture::new(0);
        script(&fx.source_dir.join("coverage_runner"), "basename \"$1\" > last_case\nsleep 30");
        let record = fx
            .collector(CoverageConfig::new().with_timeout(200))
            .run_test_case(&fx.case("n1", 1))
            .unwrap();
        assert_eq!(record.runner_exit, CoverageRunExit::TimedOut);
        assert!(record.report_found);
    }

    #[test]
    fn test_missing_runner_is_fatal() {
        let fx = Fixture::new(0);
        let collector = CoverageCollector::new(
            fx.source_dir.join("absent"),
            &fx.source_dir,
            "controller.c",
            CoverageConfig::new(),
        );
        let err = collector.run_test_case(&fx.case("n1", 1)).unwrap_err();
        assert!(matches!(err, FaultlineError::ToolLaunch { .. }));
    }
}
