//! Retry executor with exponential backoff
//!
//! Wraps any fallible async operation in a bounded retry loop. The delay
//! before retry `n` (0-indexed) is `base_delay * 2^n`, so with the default
//! one-second base the schedule reads 1s, 2s, 4s, ... When every attempt
//! has failed the executor returns the **last** error exactly as the
//! operation produced it; callers match on their own error type and never
//! see a wrapper.
//!
//! # Examples
//!
//! ```no_run
//! use caregate_common::resilience::retry_with_backoff;
//!
//! # async fn example() -> Result<String, String> {
//! let payload = retry_with_backoff(|| async { fetch().await }, 3).await?;
//! # Ok(payload)
//! # }
//! # async fn fetch() -> Result<String, String> { Ok(String::new()) }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Configuration for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt. Negative values are clamped to
    /// zero, which yields exactly one attempt; the loop can never run
    /// unbounded.
    pub max_retries: i32,
    /// Delay before the first retry; doubles on every subsequent one.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Config with the given retry budget and the default one-second base.
    #[must_use]
    pub fn new(max_retries: i32) -> Self {
        Self { max_retries, ..Self::default() }
    }

    /// Replace the base delay (used by auth paths that must stay inside a
    /// lock lease, and by tests).
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn total_attempts(&self) -> u32 {
        let retries = u32::try_from(self.max_retries.max(0)).unwrap_or(0);
        retries.saturating_add(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_millis(1000) }
    }
}

/// Run `operation` with the default backoff configuration and a caller
/// supplied retry budget.
///
/// Makes `max_retries + 1` attempts in total; `max_retries <= 0` means a
/// single attempt with no delays.
///
/// # Errors
/// The last error produced by `operation`, unchanged.
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, max_retries: i32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_config(operation, RetryConfig::new(max_retries)).await
}

/// Run `operation` under an explicit [`RetryConfig`].
///
/// # Errors
/// The last error produced by `operation`, unchanged.
pub async fn retry_with_config<T, E, F, Fut>(mut operation: F, config: RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let total_attempts = config.total_attempts();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        debug!(attempt, total_attempts, "executing retryable operation");

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= total_attempts {
                    warn!(attempt, error = %err, "operation failed, retry budget exhausted");
                    return Err(err);
                }

                let delay = backoff_delay(config.base_delay, attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn backoff_delay(base: Duration, retry_index: u32) -> Duration {
    // Shift capped to keep the multiplier in u32 range.
    let shift = retry_index.min(16);
    base.saturating_mul(1u32 << shift)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn first_success_returns_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32, String> = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
            3,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<&str, String> = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("attempt {n} failed"))
                    } else {
                        Ok("recovered")
                    }
                }
            },
            3,
        )
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_the_last_error_unchanged() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), String> = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(format!("attempt {n} failed"))
                }
            },
            3,
        )
        .await;

        assert_eq!(result.unwrap_err(), "attempt 4 failed");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_budget_makes_exactly_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), String> = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                }
            },
            0,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_budget_clamps_to_one_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<(), String> = retry_with_backoff(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                }
            },
            -5,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_double_from_the_base() {
        let base = Duration::from_millis(1000);

        assert_eq!(backoff_delay(base, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(4000));
    }

    #[test]
    fn attempt_budget_never_underflows() {
        assert_eq!(RetryConfig::new(3).total_attempts(), 4);
        assert_eq!(RetryConfig::new(0).total_attempts(), 1);
        assert_eq!(RetryConfig::new(i32::MIN).total_attempts(), 1);
    }
}
