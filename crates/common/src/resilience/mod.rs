//! Resilience primitives for calls that can fail transiently
//!
//! This module provides **generic, reusable** building blocks:
//! - **Clock abstraction**: injectable time source so TTL and scheduling
//!   logic can be tested without real waiting
//! - **Retry executor**: exponential backoff around any fallible async
//!   operation, returning the caller's own error type unchanged

pub mod clock;
pub mod retry;

// Re-export clock types
pub use clock::{Clock, SystemClock};
// Re-export retry types
pub use retry::{retry_with_backoff, retry_with_config, RetryConfig};
