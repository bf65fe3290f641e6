//! Bounded polling.
//!
//! The controller is untrusted and may hang forever, so every wait in the
//! protocol is an explicit poll loop with a deadline. A second predicate is
//! checked on each round so a dead controller is noticed immediately instead
//! of after the full timeout.

use std::time::{Duration, Instant};

/// Default polling interval (1ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;

/// Result of a bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome<A> {
    /// The condition became true
    Ready,
    /// The abort check fired first
    Aborted(A),
    /// The deadline passed
    TimedOut,
}

/// Poll-with-timeout loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    timeout: Duration,
    interval: Duration,
}

impl Poller {
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `ready` returns true.
    ///
    /// Each round checks `ready` first, then `abort`, then the deadline, then
    /// sleeps for the interval. `ready` is checked once more after the
    /// deadline so a condition that appeared during the last sleep still wins.
    pub fn wait_until<A>(
        &self,
        mut ready: impl FnMut() -> bool,
        mut abort: impl FnMut() -> Option<A>,
    ) -> WaitOutcome<A> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if ready() {
                return WaitOutcome::Ready;
            }
            if let Some(reason) = abort() {
                return WaitOutcome::Aborted(reason);
            }
            if Instant::now() >= deadline {
                return if ready() {
                    WaitOutcome::Ready
                } else {
                    WaitOutcome::TimedOut
                };
            }
            std::thread::sleep(self.interval);
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(5),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick(timeout_ms: u64) -> Poller {
        Poller::new(Duration::from_millis(timeout_ms), Duration::from_millis(1))
    }

    #[test]
    fn test_ready_immediately() {
        let outcome: WaitOutcome<()> = quick(10).wait_until(|| true, || None);
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn test_ready_after_polls() {
        let calls = Cell::new(0);
        let outcome: WaitOutcome<()> = quick(1_000).wait_until(
            || {
                calls.set(calls.get() + 1);
                calls.get() >= 5
            },
            || None,
        );
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn test_abort_wins_over_timeout() {
        let outcome = quick(1_000).wait_until(|| false, || Some(139));
        assert_eq!(outcome, WaitOutcome::Aborted(139));
    }

    #[test]
    fn test_ready_checked_before_abort() {
        let outcome = quick(1_000).wait_until(|| true, || Some("exited"));
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn test_times_out() {
        let start = Instant::now();
        let outcome: WaitOutcome<()> = quick(20).wait_until(|| false, || None);
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
