//! Clocks and bounded polling.
//!
//! Every timed suspension in the shell goes through a [`Clock`] so tests can
//! run the retry and polling loops without sleeping.

use crate::ShellError;
use crate::ShellResult;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only moves when something sleeps on it.
#[derive(Debug, Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.elapsed = guard.elapsed.saturating_add(duration);
    }

    /// Durations passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        let guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.elapsed
    }

    fn sleep(&self, duration: Duration) {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.elapsed = guard.elapsed.saturating_add(duration);
        guard.sleeps.push(duration);
    }
}

/// Polls `check` every `interval` until it yields a value or `timeout` passes.
pub fn wait_for<T>(
    clock: &dyn Clock,
    interval: Duration,
    timeout: Duration,
    mut check: impl FnMut() -> Option<T>,
) -> ShellResult<T> {
    let interval = interval.max(MIN_POLL_INTERVAL);
    let started = clock.now();

    loop {
        if let Some(value) = check() {
            return Ok(value);
        }

        let waited = clock.now().saturating_sub(started);
        if waited >= timeout {
            return Err(ShellError::new(
                "wait.timeout",
                format!("condition not met within {} ms", timeout.as_millis()),
            ));
        }

        clock.sleep(interval.min(timeout - waited));
    }
}

#[cfg(test)]
mod tests {
    use super::Clock;
    use super::ManualClock;
    use super::wait_for;
    use std::time::Duration;

    #[test]
    fn wait_returns_as_soon_as_the_check_succeeds() {
        let clock = ManualClock::new();
        let mut attempts = 0;
        let value = wait_for(
            &clock,
            Duration::from_millis(50),
            Duration::from_secs(1),
            || {
                attempts += 1;
                (attempts == 3).then_some("ready")
            },
        );

        assert_eq!(value, Ok("ready"));
        assert_eq!(clock.now(), Duration::from_millis(100));
    }

    #[test]
    fn wait_times_out_without_overshooting() {
        let clock = ManualClock::new();
        let value: Result<(), _> = wait_for(
            &clock,
            Duration::from_millis(40),
            Duration::from_millis(100),
            || None,
        );

        let error = match value {
            Ok(()) => panic!("check never succeeds"),
            Err(error) => error,
        };
        assert_eq!(error.code, "wait.timeout");
        assert_eq!(clock.now(), Duration::from_millis(100));
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(40),
                Duration::from_millis(40),
                Duration::from_millis(20)
            ]
        );
    }
}
