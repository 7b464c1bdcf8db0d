//! Time abstraction for testability
//!
//! Components that reason about elapsed time (cache TTLs, queue scheduling)
//! take a clock instead of calling `Instant::now()` directly, so tests can
//! advance time deterministically. Production code uses [`SystemClock`];
//! tests use `MockClock` from the testing module.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Trait for time operations to enable testing.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();

        assert!(second >= first);
    }

    #[test]
    fn millis_since_epoch_is_positive() {
        let clock = SystemClock;
        assert!(clock.millis_since_epoch() > 0);
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(SystemClock);
        let first = Clock::now(&clock);
        let second = Clock::now(&clock);

        assert!(second >= first);
    }
}
