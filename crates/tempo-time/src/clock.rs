use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic nanosecond counter.
pub trait Clock {
    /// Returns the current time in nanoseconds. Never decreases.
    fn now_ns(&self) -> u64;

    /// Blocks until [`Clock::now_ns`] is at least `deadline_ns`.
    fn wait_until(&self, deadline_ns: u64);
}

/// Virtual clock for deterministic tests.
///
/// Clones share the same counter, so a test can keep one handle and hand another to a device.
/// Time only moves through [`ManualClock::advance_ns`], [`Clock::wait_until`] or, when
/// configured, a fixed step applied on every read (a free-running counter that busy-poll loops
/// can observe moving).
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
    read_step_ns: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances by `step_ns` every time it is read.
    pub fn with_read_step(step_ns: u64) -> Self {
        Self {
            now_ns: Arc::default(),
            read_step_ns: step_ns,
        }
    }

    /// Advances the clock by `ns` nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics if advancing would overflow `u64`. (`u64` nanoseconds is ~584 years.)
    pub fn advance_ns(&self, ns: u64) {
        let advanced = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| now.checked_add(ns));
        assert!(advanced.is_ok(), "virtual clock overflowed u64::MAX");
    }

    /// Reads the counter without applying the read step.
    pub fn peek_ns(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        if self.read_step_ns == 0 {
            return self.peek_ns();
        }
        self.now_ns
            .fetch_add(self.read_step_ns, Ordering::SeqCst)
            .saturating_add(self.read_step_ns)
    }

    fn wait_until(&self, deadline_ns: u64) {
        self.now_ns.fetch_max(deadline_ns, Ordering::SeqCst);
    }
}

/// Host monotonic clock, counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn wait_until(&self, deadline_ns: u64) {
        loop {
            let now = self.now_ns();
            if now >= deadline_ns {
                return;
            }
            std::thread::sleep(Duration::from_nanos(deadline_ns - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance_ns(42);
        assert_eq!(other.now_ns(), 42);
    }

    #[test]
    fn manual_clock_wait_until_never_moves_backwards() {
        let clock = ManualClock::new();
        clock.advance_ns(100);
        clock.wait_until(50);
        assert_eq!(clock.now_ns(), 100);
        clock.wait_until(250);
        assert_eq!(clock.now_ns(), 250);
    }

    #[test]
    fn overflowing_advance_leaves_time_untouched() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance_ns(10);

        let res = catch_unwind(AssertUnwindSafe(|| clock.advance_ns(u64::MAX)));
        assert!(res.is_err());
        assert_eq!(other.peek_ns(), 10);
    }

    #[test]
    fn read_step_makes_busy_polling_observe_progress() {
        let clock = ManualClock::with_read_step(7);
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b > a);
        assert_eq!(b - a, 7);
    }

    #[test]
    fn std_clock_is_monotonic() {
        let clock = StdClock::new();
        let a = clock.now_ns();
        clock.wait_until(a + 1_000);
        assert!(clock.now_ns() >= a + 1_000);
    }
}
