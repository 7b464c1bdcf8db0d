//! Mock clock for deterministic tests
//!
//! Complements the [`Clock`] abstraction with an implementation whose time
//! only moves when a test says so. TTL expiry, refresh margins, and queue
//! backoff schedules all become testable without real waiting.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use caregate_common::testing::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! let end = clock.now();
//! assert_eq!(end.duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use crate::resilience::Clock;

/// Mock clock for deterministic testing
///
/// This implementation allows you to control time in tests, making them
/// deterministic and fast. You can advance time manually without actually
/// waiting. Clones share the same elapsed counter, so a clock handed to the
/// code under test can still be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a new mock clock
    ///
    /// The clock starts at the current real time but can be advanced
    /// manually without real time passing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Advance the mock clock by a duration
    ///
    /// This simulates time passing without actually waiting.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use caregate_common::testing::MockClock;
    ///
    /// let clock = MockClock::new();
    /// clock.advance(Duration::from_secs(10));
    /// assert_eq!(clock.elapsed(), Duration::from_secs(10));
    /// ```
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Set the mock clock to a specific elapsed time
    ///
    /// This sets the clock to an absolute elapsed time, replacing
    /// any previous elapsed time.
    pub fn set_elapsed(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed = duration;
    }

    /// Get the current elapsed time
    ///
    /// Returns how much time has been simulated since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        // Test utility: panic on poisoned mutex to fail tests early
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // Test utility: panic on poisoned mutex to fail tests early
        self.start + *self.elapsed.lock().expect("mutex poisoned")
    }

    fn system_time(&self) -> SystemTime {
        // Test utility: panic on poisoned mutex to fail tests early
        self.base_system_time + *self.elapsed.lock().expect("mutex poisoned")
    }
}
