//! Controller process lifecycle.

use super::outcome::ExitInfo;
use crate::command::{isolate_group, kill_group, spawn_retrying_busy, GroupSignal};
use crate::result::{FaultlineError, FaultlineResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Controller stdout/stderr land here, inside the run directory
pub const CONTROLLER_LOG: &str = "controller.log";

/// A running controller in its own process group.
///
/// Dropping the handle tears the process group down.
#[derive(Debug)]
pub struct ControllerProcess {
    child: Option<Child>,
    grace: Duration,
    log_path: PathBuf,
}

impl ControllerProcess {
    /// Launch `executable` with `workdir` as its current directory
    pub fn spawn(executable: &Path, workdir: &Path, grace: Duration) -> FaultlineResult<Self> {
        let program = executable
            .canonicalize()
            .unwrap_or_else(|_| executable.to_path_buf());
        let log_path = workdir.join(CONTROLLER_LOG);
        let log = File::create(&log_path)?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&program);
        command
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err);
        isolate_group(&mut command);

        let child = spawn_retrying_busy(&mut command).map_err(|e| {
            FaultlineError::tool_launch(program.display().to_string(), e.to_string())
        })?;
        tracing::debug!(pid = child.id(), program = %program.display(), "controller started");

        Ok(Self {
            child: Some(child),
            grace,
            log_path,
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Exit status if the controller has exited, without blocking
    pub fn try_exit(&mut self) -> Option<ExitInfo> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(status) => status.map(ExitInfo::from_status),
            Err(e) => {
                tracing::warn!(error = %e, "failed to poll controller status");
                None
            }
        }
    }

    /// Stop the controller: terminate signal, grace period, then force-kill.
    ///
    /// Returns the exit status if it could be collected. Safe to call twice.
    pub fn terminate(&mut self) -> Option<ExitInfo> {
        let mut child = self.child.take()?;
        if let Ok(Some(status)) = child.try_wait() {
            kill_group(child.id(), GroupSignal::Kill);
            return Some(ExitInfo::from_status(status));
        }

        kill_group(child.id(), GroupSignal::Terminate);
        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(status)) => {
                    kill_group(child.id(), GroupSignal::Kill);
                    tracing::debug!(pid = child.id(), "controller terminated");
                    return Some(ExitInfo::from_status(status));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }

        tracing::warn!(pid = child.id(), "controller ignored SIGTERM, killing");
        kill_group(child.id(), GroupSignal::Kill);
        let _ = child.kill();
        match child.wait() {
            Ok(status) => Some(ExitInfo::from_status(status)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to reap controller");
                None
            }
        }
    }
}

impl Drop for ControllerProcess {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}
