//! Process/IPC test runner.
//!
//! Drives a controller executable through its file-based handshake, one
//! test case at a time:
//!
//! ```text
//! runner                               controller
//!   create _state/_data, remove _flag
//!   spawn (own process group)  ─────▶  init, touch _flag
//!   wait for _flag
//!   ┌ per iteration i
//!   │ wait for _flag
//!   │ write t{i} into _state
//!   │ remove _flag             ─────▶  read _state, compute
//!   │ wait for _flag           ◀─────  write _data, touch _flag
//!   │ read _data, compare with output.t{i}
//!   └ stop at the first failure
//!   SIGTERM group, grace, SIGKILL; remove files
//! ```
//!
//! Every wait is bounded and also watches for controller exit. A test case
//! yields exactly one [`Outcome`]; infrastructure problems in one test case
//! never abort the others.

mod config;
mod ipc;
mod outcome;
mod process;
mod test_case;
mod validate;

pub use config::{
    RunnerConfig, DEFAULT_COMPARED_JOINTS, DEFAULT_EPSILON, DEFAULT_ITERATION_TIMEOUT_MS,
    DEFAULT_STARTUP_TIMEOUT_MS, DEFAULT_TERMINATE_GRACE_MS,
};
pub use ipc::{IpcChannel, DATA_FILE, FLAG_FILE, STATE_FILE};
pub use outcome::{ExitInfo, IterationResult, Outcome, StartupFailure, TestCaseResult, TimeoutPhase};
pub use process::{ControllerProcess, CONTROLLER_LOG};
pub use test_case::{NamingConvention, TestCase};
pub use validate::{comparison_vector, cosine_distance, validate_iteration, Verdict};

use crate::codec::decode_vote;
use crate::wait::{Poller, WaitOutcome};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs test cases against one controller executable
#[derive(Debug, Clone)]
pub struct TestRunner {
    executable: PathBuf,
    workdir: PathBuf,
    config: RunnerConfig,
}

/// Controller and IPC files for one test case; dropping tears both down
struct CaseRun {
    process: ControllerProcess,
    channel: IpcChannel,
}

impl Drop for CaseRun {
    fn drop(&mut self) {
        let exit = self.process.terminate();
        self.channel.remove();
        tracing::debug!(?exit, "controller stopped, IPC files removed");
    }
}

impl CaseRun {
    /// Wait for the sentinel, mapping exit and timeout to outcomes
    fn await_flag(&mut self, poller: &Poller, iteration: usize, phase: TimeoutPhase) -> Option<Outcome> {
        let channel = &self.channel;
        let process = &mut self.process;
        match poller.wait_until(|| channel.flag_exists(), || process.try_exit()) {
            WaitOutcome::Ready => None,
            WaitOutcome::Aborted(exit) => Some(Outcome::ControllerCrashed { iteration, exit }),
            WaitOutcome::TimedOut => Some(Outcome::Timeout { iteration, phase }),
        }
    }
}

/// Progress of a test case while it runs
#[derive(Debug, Default)]
struct Progress {
    iterations_run: usize,
    iteration_results: Vec<IterationResult>,
}

impl TestRunner {
    #[must_use]
    pub fn new(
        executable: impl Into<PathBuf>,
        workdir: impl Into<PathBuf>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            executable: executable.into(),
            workdir: workdir.into(),
            config,
        }
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every test case in order
    #[must_use]
    pub fn run_all(&self, cases: &[TestCase]) -> Vec<TestCaseResult> {
        self.run_all_with(cases, |_| {})
    }

    /// Run every test case in order, reporting each result as it lands
    pub fn run_all_with(
        &self,
        cases: &[TestCase],
        mut on_result: impl FnMut(&TestCaseResult),
    ) -> Vec<TestCaseResult> {
        cases
            .iter()
            .map(|case| {
                let result = self.run_test_case(case);
                on_result(&result);
                result
            })
            .collect()
    }

    /// Run one test case to its terminal outcome
    #[must_use]
    pub fn run_test_case(&self, case: &TestCase) -> TestCaseResult {
        tracing::info!(
            test_case = %case.name,
            iterations = case.iteration_count,
            "running test case"
        );
        let start = Instant::now();
        let mut progress = Progress::default();
        let outcome = self.drive(case, &mut progress);

        let result = TestCaseResult {
            name: case.name.clone(),
            outcome,
            iterations_run: progress.iterations_run,
            iterations_total: case.iteration_count,
            iteration_results: progress.iteration_results,
            duration: start.elapsed(),
        };
        if result.passed() {
            tracing::info!(test_case = %case.name, "PASS");
        } else {
            tracing::info!(
                test_case = %case.name,
                iteration = ?result.failed_at_iteration(),
                reason = %result.failure_reason().unwrap_or_default(),
                "FAIL"
            );
        }
        result
    }

    fn drive(&self, case: &TestCase, progress: &mut Progress) -> Outcome {
        let first_input = case.input_path(1);
        let state_len = match std::fs::metadata(&first_input) {
            Ok(meta) => meta.len() as usize,
            Err(_) => {
                progress.iterations_run = 1;
                return Outcome::InputOrOracleMissing {
                    iteration: 1,
                    path: first_input,
                };
            }
        };

        let channel = match IpcChannel::create(&self.workdir, state_len) {
            Ok(channel) => channel,
            Err(e) => {
                return Outcome::IpcFailure {
                    iteration: 0,
                    message: e.to_string(),
                }
            }
        };
        let process = match ControllerProcess::spawn(
            &self.executable,
            &self.workdir,
            self.config.terminate_grace(),
        ) {
            Ok(process) => process,
            Err(e) => {
                channel.remove();
                return Outcome::ControllerStartupFailed {
                    reason: StartupFailure::Spawn(e.to_string()),
                };
            }
        };
        let mut run = CaseRun { process, channel };

        let startup = {
            let channel = &run.channel;
            let process = &mut run.process;
            self.config
                .startup_poller()
                .wait_until(|| channel.flag_exists(), || process.try_exit())
        };
        match startup {
            WaitOutcome::Ready => tracing::debug!("controller ready"),
            WaitOutcome::Aborted(exit) => {
                return Outcome::ControllerStartupFailed {
                    reason: StartupFailure::Exited(exit),
                }
            }
            WaitOutcome::TimedOut => {
                return Outcome::ControllerStartupFailed {
                    reason: StartupFailure::TimedOut,
                }
            }
        }

        let poller = self.config.iteration_poller();
        for iteration in 1..=case.iteration_count {
            progress.iterations_run = iteration;
            let iteration_start = Instant::now();
            tracing::debug!(iteration, total = case.iteration_count, "iteration");

            let oracle_path = case.oracle_path(iteration);
            if !oracle_path.is_file() {
                return Outcome::InputOrOracleMissing {
                    iteration,
                    path: oracle_path,
                };
            }
            let input_path = case.input_path(iteration);
            let Ok(input) = std::fs::read(&input_path) else {
                return Outcome::InputOrOracleMissing {
                    iteration,
                    path: input_path,
                };
            };

            let ready_phase = if iteration == 1 {
                TimeoutPhase::ReadyForInput
            } else {
                TimeoutPhase::Processing
            };
            if let Some(outcome) = run.await_flag(&poller, iteration, ready_phase) {
                return outcome;
            }

            if let Err(e) = run
                .channel
                .write_state(&input)
                .and_then(|()| run.channel.clear_flag())
            {
                return Outcome::IpcFailure {
                    iteration,
                    message: e.to_string(),
                };
            }

            if let Some(outcome) = run.await_flag(&poller, iteration, TimeoutPhase::Processing) {
                return outcome;
            }

            let output = match run.channel.read_data() {
                Ok(bytes) => bytes,
                Err(e) => {
                    return Outcome::IpcFailure {
                        iteration,
                        message: e.to_string(),
                    }
                }
            };
            let controller_vote = match decode_vote(&output) {
                Ok(vote) => vote,
                Err(e) => {
                    return Outcome::DecodeFailed {
                        iteration,
                        message: format!("controller output: {e}"),
                    }
                }
            };
            let oracle_vote = match std::fs::read(&oracle_path) {
                Ok(bytes) => match decode_vote(&bytes) {
                    Ok(vote) => vote,
                    Err(e) => {
                        return Outcome::DecodeFailed {
                            iteration,
                            message: format!("oracle {}: {e}", oracle_path.display()),
                        }
                    }
                },
                Err(_) => {
                    return Outcome::InputOrOracleMissing {
                        iteration,
                        path: oracle_path,
                    }
                }
            };

            let verdict = validate_iteration(
                &controller_vote,
                &oracle_vote,
                self.config.epsilon,
                self.config.compared_joints,
            );
            let passed = verdict.passed;
            let reason = verdict.reason.clone();
            progress.iteration_results.push(IterationResult {
                iteration,
                verdict,
                duration: iteration_start.elapsed(),
            });
            if !passed {
                return Outcome::FailedValidation { iteration, reason };
            }
        }

        Outcome::Passed
    }
}
