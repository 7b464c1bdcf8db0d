//! Shared async building blocks for CareGate crates.
//!
//! # Modules
//!
//! - [`cache`]: the backend-agnostic key-value contract and the in-process
//!   store used when no distributed backend is reachable
//! - [`resilience`]: clock abstraction and the exponential-backoff retry
//!   executor
//! - [`testing`]: deterministic clock plus the cache conformance suite

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod resilience;
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use cache::{CacheError, CacheResult, CacheStore, KeyTtl, MemoryCache};
pub use resilience::{
    retry_with_backoff, retry_with_config, Clock, RetryConfig, SystemClock,
};
