//! Validate command handler

use super::{print_json, reporter_for, Workdir};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use crate::ValidateArgs;
use faultline::{RunnerConfig, TestCase, TestCaseResult, TestRunner};
use serde::Serialize;
use std::time::Duration;

/// Outcome of a validate run, as printed with `--format json`
#[derive(Debug, Clone, Serialize)]
pub struct ValidationSummary {
    /// Test cases that passed
    pub passed: usize,
    /// Test cases that failed
    pub failed: usize,
    /// Per-test-case results in run order
    pub results: Vec<TestCaseResult>,
}

impl ValidationSummary {
    /// Tally results
    #[must_use]
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    /// Total run time across test cases
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }
}

/// Execute the validate command
pub fn execute_validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    if !args.controller.is_file() {
        return Err(CliError::invalid_argument(format!(
            "controller executable not found: {}",
            args.controller.display()
        )));
    }
    let runner_config = validate_runner_config(&config.session.runner, args.epsilon)?;

    let cases = TestCase::discover(&args.test_dir, &config.session.naming)?;
    if cases.is_empty() {
        return Err(CliError::invalid_argument(format!(
            "no test cases found in {}",
            args.test_dir.display()
        )));
    }

    let workdir = Workdir::resolve(args.workdir.as_deref(), false)?;
    let runner = TestRunner::new(&args.controller, workdir.path(), runner_config);

    let mut reporter = reporter_for(config);
    reporter.start_progress(cases.len() as u64, "running test cases");
    let results = runner.run_all_with(&cases, |result| {
        reporter.increment(1);
        if result.passed() {
            reporter.success(&result.to_string());
        } else {
            reporter.failure(&result.to_string());
        }
    });
    reporter.finish();

    let summary = ValidationSummary::from_results(results);
    reporter.summary(summary.passed, summary.failed, summary.duration());

    if OutputFormat::from(args.format) == OutputFormat::Json {
        print_json(&summary)?;
    }

    if summary.failed > 0 {
        return Err(CliError::tests_failed(summary.failed, summary.results.len()));
    }
    Ok(())
}

/// Runner settings with the `--epsilon` override applied
pub fn validate_runner_config(base: &RunnerConfig, epsilon: Option<f64>) -> CliResult<RunnerConfig> {
    let config = match epsilon {
        Some(epsilon) => base.clone().with_epsilon(epsilon),
        None => base.clone(),
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use faultline::Outcome;

    fn result(name: &str, outcome: Outcome) -> TestCaseResult {
        TestCaseResult {
            name: name.into(),
            outcome,
            iterations_run: 1,
            iterations_total: 1,
            iteration_results: Vec::new(),
            duration: Duration::from_millis(250),
        }
    }

    mod runner_config_tests {
        use super::*;

        #[test]
        fn test_epsilon_override() {
            let config = validate_runner_config(&RunnerConfig::new(), Some(0.3)).unwrap();
            assert!((config.epsilon - 0.3).abs() < f64::EPSILON);
        }

        #[test]
        fn test_base_kept_without_override() {
            let base = RunnerConfig::new().with_iteration_timeout(900);
            assert_eq!(validate_runner_config(&base, None).unwrap(), base);
        }

        #[test]
        fn test_negative_epsilon_rejected() {
            assert!(validate_runner_config(&RunnerConfig::new(), Some(-0.5)).is_err());
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_tally() {
            let summary = ValidationSummary::from_results(vec![
                result(
                    "n1",
                    Outcome::FailedValidation {
                        iteration: 1,
                        reason: "FAIL: index mismatch (9 != 1)".into(),
                    },
                ),
                result("p1", Outcome::Passed),
                result("p2", Outcome::Passed),
            ]);
            assert_eq!(summary.passed, 2);
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.duration(), Duration::from_millis(750));
        }

        #[test]
        fn test_serializes() {
            let summary = ValidationSummary::from_results(vec![result("p1", Outcome::Passed)]);
            let json = serde_json::to_value(&summary).unwrap();
            assert_eq!(json["passed"], 1);
            assert_eq!(json["results"][0]["name"], "p1");
        }
    }
}
