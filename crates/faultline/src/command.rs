//! Subprocess plumbing shared by the controller, build and coverage steps.
//!
//! Every child is started in its own process group so that a timeout can
//! take down anything it forked as well.

use crate::runner::ExitInfo;
use crate::wait::{Poller, WaitOutcome};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Captured result of a bounded subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit: ExitInfo,
    pub stdout: String,
    pub stderr: String,
    /// The deadline passed and the process group was killed
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        !self.timed_out && matches!(self.exit.code, Some(0))
    }

    /// Stderr if it has content, stdout otherwise
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Run `command` to completion, killing its process group after `timeout`.
///
/// Stdin is closed; stdout and stderr are captured.
pub(crate) fn run_bounded(command: &mut Command, timeout: Duration) -> std::io::Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    isolate_group(command);

    let start = Instant::now();
    let mut child = spawn_retrying_busy(command)?;
    let pid = child.id();
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let poller = Poller::new(timeout, Duration::from_millis(5));
    let (status, timed_out) = match poller.wait_until(|| false, || child.try_wait().ok().flatten()) {
        WaitOutcome::Aborted(status) => (status, false),
        WaitOutcome::Ready | WaitOutcome::TimedOut => {
            tracing::warn!(pid, timeout_ms = timeout.as_millis() as u64, "subprocess timed out, killing");
            kill_group(pid, GroupSignal::Kill);
            let _ = child.kill();
            (child.wait()?, true)
        }
    };
    // stragglers still holding the pipes would block the readers
    kill_group(pid, GroupSignal::Kill);

    Ok(CommandOutput {
        exit: ExitInfo::from_status(status),
        stdout: stdout.map(join_text).unwrap_or_default(),
        stderr: stderr.map(join_text).unwrap_or_default(),
        timed_out,
        duration: start.elapsed(),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_text(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Put the child in a new process group led by itself
pub(crate) fn isolate_group(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = command;
}

/// A freshly written executable can briefly report ETXTBSY while another
/// thread's fork still holds its write descriptor.
pub(crate) fn spawn_retrying_busy(command: &mut Command) -> std::io::Result<Child> {
    const ATTEMPTS: u32 = 5;
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if attempt < ATTEMPTS && is_text_busy(&e) => {
                attempt += 1;
                std::thread::sleep(Duration::from_millis(20));
            }
            result => return result,
        }
    }
}

#[cfg(unix)]
fn is_text_busy(error: &std::io::Error) -> bool {
    error.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
}

#[cfg(not(unix))]
fn is_text_busy(_error: &std::io::Error) -> bool {
    false
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupSignal {
    Terminate,
    Kill,
}

/// Signal a whole process group; `leader` is the pid of a child started
/// with [`isolate_group`]
#[cfg(unix)]
pub(crate) fn kill_group(leader: u32, signal: GroupSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(leader) else {
        return;
    };
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    // ESRCH just means the group is already gone
    if let Err(errno) = killpg(Pid::from_raw(raw), signal) {
        tracing::trace!(%errno, ?signal, "killpg");
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(leader: u32, signal: GroupSignal) {
    let _ = (leader, signal);
}
