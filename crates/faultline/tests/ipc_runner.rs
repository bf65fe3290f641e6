//! End-to-end runner tests against scripted controllers.
//!
//! Each fake controller speaks the real file handshake: it touches `_flag`
//! when ready, waits for the runner to remove it, copies a canned answer into
//! `_data` and touches `_flag` again.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use faultline::codec::{encode_state, encode_vote, BoundedArray, State, TrajectoryPoint, Vote};
use faultline::runner::{
    NamingConvention, Outcome, RunnerConfig, StartupFailure, TestCase, TestRunner, TimeoutPhase,
    DATA_FILE, FLAG_FILE, STATE_FILE,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Fixture {
    root: TempDir,
    tests: PathBuf,
    answers: PathBuf,
    workdir: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let tests = root.path().join("tests");
        let answers = root.path().join("answers");
        let workdir = root.path().join("work");
        for dir in [&tests, &answers, &workdir] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            root,
            tests,
            answers,
            workdir,
        }
    }

    /// Test case whose iteration inputs are captured-size states
    fn case(&self, name: &str, oracles: &[Vec<u8>]) -> TestCase {
        let dir = self.tests.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (i, oracle) in oracles.iter().enumerate() {
            let mut input = encode_state(&State::new(i as i32 + 1, 0, vec!["j0".into()], vec![]));
            input.resize(832_033, 0);
            fs::write(dir.join(format!("t{}", i + 1)), input).unwrap();
            fs::write(dir.join(format!("output.t{}", i + 1)), oracle).unwrap();
        }
        TestCase::from_directory(&dir, name.starts_with('p')).unwrap()
    }

    /// Canned controller answers, one per consumed input
    fn answers(&self, answers: &[Vec<u8>]) {
        for (i, answer) in answers.iter().enumerate() {
            fs::write(self.answers.join(format!("a{}", i + 1)), answer).unwrap();
        }
    }

    /// Controller that answers every input from the answers directory.
    /// `on_input` runs with `$i` set to the 1-based input number before the
    /// answer is copied.
    fn handshake_controller(&self, on_input: &str) -> PathBuf {
        self.script(&format!(
            r#"i=0
touch {flag}
while :; do
  while [ -e {flag} ]; do sleep 0.005; done
  i=$((i+1))
  echo "$i" >> consumed
  [ "$i" -eq 1 ] && wc -c < {state} | tr -d ' ' > state_size
  {on_input}
  cp "{answers}/a$i" {data}
  touch {flag}
done"#,
            flag = FLAG_FILE,
            state = STATE_FILE,
            data = DATA_FILE,
            answers = self.answers.display(),
        ))
    }

    fn script(&self, body: &str) -> PathBuf {
        let path = self.root.path().join("controller");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn runner(&self, controller: &Path) -> TestRunner {
        let config = RunnerConfig::new()
            .with_startup_timeout(3_000)
            .with_iteration_timeout(3_000)
            .with_terminate_grace(200);
        TestRunner::new(controller, &self.workdir, config)
    }

    fn consumed(&self) -> usize {
        fs::read_to_string(self.workdir.join("consumed"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

fn vote(index: i32, positions: &[f64]) -> Vec<u8> {
    encode_vote(&Vote {
        sequence_index: index,
        point: TrajectoryPoint {
            positions: BoundedArray::from_values(positions),
            velocities: BoundedArray::from_values(&[0.1; 6]),
            ..TrajectoryPoint::default()
        },
    })
}

fn good(index: i32) -> Vec<u8> {
    vote(index, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
}

fn bad(index: i32) -> Vec<u8> {
    vote(index, &[-1.0, -2.0, -3.0, -4.0, -5.0, -6.0])
}

// ============================================================================
// Handshake and validation
// ============================================================================

#[test]
fn test_all_iterations_pass() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1), good(2), good(3)]);
    fx.answers(&[good(1), good(2), good(3)]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);

    assert!(result.passed(), "{result}");
    assert_eq!(result.iterations_run, 3);
    assert_eq!(result.iteration_results.len(), 3);
    assert!(result.iteration_results.iter().all(|r| r.passed()));
    assert_eq!(result.to_string(), "p1: PASS (3/3 iterations)");
    assert_eq!(fx.consumed(), 3);
}

#[test]
fn test_stops_at_first_failing_iteration() {
    let fx = Fixture::new();
    let case = fx.case("n1", &[good(1), good(2), good(3), good(4)]);
    fx.answers(&[good(1), good(2), bad(3), good(4)]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);

    assert!(!result.passed());
    assert_eq!(result.iterations_run, 3);
    assert_eq!(result.failed_at_iteration(), Some(3));
    assert!(matches!(
        result.outcome,
        Outcome::FailedValidation { iteration: 3, .. }
    ));
    assert!(result
        .failure_reason()
        .unwrap()
        .starts_with("FAIL: cosine_distance="));
    assert_eq!(fx.consumed(), 3, "no fourth input may be sent");
}

#[test]
fn test_index_mismatch() {
    let fx = Fixture::new();
    let case = fx.case("n2", &[good(1)]);
    fx.answers(&[good(9)]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);
    assert_eq!(
        result.failure_reason().as_deref(),
        Some("FAIL: index mismatch (9 != 1)")
    );
}

#[test]
fn test_state_buffer_sized_from_first_input() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1)]);
    fx.answers(&[good(1)]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);
    assert!(result.passed(), "{result}");
    let size = fs::read_to_string(fx.workdir.join("state_size")).unwrap();
    assert_eq!(size.trim(), "832033");
}

#[test]
fn test_ipc_files_removed_after_run() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1)]);
    fx.answers(&[good(1)]);
    let controller = fx.handshake_controller(":");

    let _ = fx.runner(&controller).run_test_case(&case);
    for file in [STATE_FILE, DATA_FILE, FLAG_FILE] {
        assert!(!fx.workdir.join(file).exists(), "{file} left behind");
    }
}

#[test]
fn test_undecodable_output() {
    let fx = Fixture::new();
    let case = fx.case("n1", &[good(1)]);
    fx.answers(&[vec![0u8; 16]]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);
    assert!(matches!(
        result.outcome,
        Outcome::DecodeFailed { iteration: 1, .. }
    ));
    assert!(result.iteration_results.is_empty());
}

#[test]
fn test_missing_oracle_reported_at_iteration() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1), good(2)]);
    fs::remove_file(case.oracle_path(2)).unwrap();
    fx.answers(&[good(1), good(2)]);
    let controller = fx.handshake_controller(":");

    let result = fx.runner(&controller).run_test_case(&case);
    match result.outcome {
        Outcome::InputOrOracleMissing { iteration, path } => {
            assert_eq!(iteration, 2);
            assert_eq!(path, case.oracle_path(2));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

// ============================================================================
// Controller failures
// ============================================================================

#[test]
fn test_startup_timeout_never_hangs() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1)]);
    let controller = fx.script("sleep 30");
    let runner = TestRunner::new(
        &controller,
        &fx.workdir,
        RunnerConfig::new()
            .with_startup_timeout(200)
            .with_terminate_grace(200),
    );

    let start = Instant::now();
    let result = runner.run_test_case(&case);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(
        result.outcome,
        Outcome::ControllerStartupFailed {
            reason: StartupFailure::TimedOut
        }
    );
    assert_eq!(result.iterations_run, 0);
    assert_eq!(result.failed_at_iteration(), Some(0));
}

#[test]
fn test_exit_during_startup() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1)]);
    let controller = fx.script("exit 2");

    let result = fx.runner(&controller).run_test_case(&case);
    match result.outcome {
        Outcome::ControllerStartupFailed {
            reason: StartupFailure::Exited(exit),
        } => assert_eq!(exit.code, Some(2)),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn test_crash_while_processing() {
    let fx = Fixture::new();
    let case = fx.case("n1", &[good(1), good(2), good(3)]);
    fx.answers(&[good(1), good(2), good(3)]);
    let controller = fx.handshake_controller(r#"[ "$i" -eq 2 ] && exit 7"#);

    let result = fx.runner(&controller).run_test_case(&case);
    match &result.outcome {
        Outcome::ControllerCrashed { iteration, exit } => {
            assert_eq!(*iteration, 2);
            assert_eq!(exit.code, Some(7));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(result.iterations_run, 2);
    assert_eq!(result.iteration_results.len(), 1);
}

#[test]
fn test_hang_while_processing_times_out() {
    let fx = Fixture::new();
    let case = fx.case("n1", &[good(1), good(2)]);
    fx.answers(&[good(1), good(2)]);
    let controller = fx.handshake_controller(r#"[ "$i" -eq 1 ] && sleep 30"#);
    let runner = TestRunner::new(
        &controller,
        &fx.workdir,
        RunnerConfig::new()
            .with_iteration_timeout(300)
            .with_terminate_grace(200),
    );

    let start = Instant::now();
    let result = runner.run_test_case(&case);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(
        result.outcome,
        Outcome::Timeout {
            iteration: 1,
            phase: TimeoutPhase::Processing
        }
    );
}

#[test]
fn test_missing_executable() {
    let fx = Fixture::new();
    let case = fx.case("p1", &[good(1)]);
    let runner = TestRunner::new(fx.workdir.join("nope"), &fx.workdir, RunnerConfig::new());

    let result = runner.run_test_case(&case);
    assert!(matches!(
        result.outcome,
        Outcome::ControllerStartupFailed {
            reason: StartupFailure::Spawn(_)
        }
    ));
}

// ============================================================================
// Multiple test cases
// ============================================================================

#[test]
fn test_run_all_in_discovery_order() {
    let fx = Fixture::new();
    fx.case("p2", &[good(1)]);
    fx.case("n1", &[good(1)]);
    fx.case("p1", &[good(1)]);
    fx.answers(&[good(1)]);
    // every run starts a fresh controller, so `a1` answers each test case
    let controller = fx.script(&format!(
        r#"touch {flag}
while [ -e {flag} ]; do sleep 0.005; done
cp "{answers}/a1" {data}
touch {flag}
while :; do sleep 1; done"#,
        flag = FLAG_FILE,
        data = DATA_FILE,
        answers = fx.answers.display(),
    ));

    let cases = TestCase::discover(&fx.tests, &NamingConvention::default()).unwrap();
    let mut seen = Vec::new();
    let results = fx
        .runner(&controller)
        .run_all_with(&cases, |r| seen.push(r.name.clone()));

    assert_eq!(seen, vec!["n1", "p1", "p2"]);
    assert!(results.iter().all(|r| r.passed()));
}
