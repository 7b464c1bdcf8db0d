//! Testing utilities and helpers
//!
//! This module provides the shared test instrumentation for CareGate crates:
//! - **[`time`]**: deterministic mock clock for TTL and scheduling tests
//! - **[`conformance`]**: the cache contract suite every backend must pass
//!
//! The conformance suite runs inside the in-process store's unit tests and
//! against a live Redis in the integration tests, so the two backends cannot
//! drift apart on contract semantics.

pub mod conformance;
pub mod time;

// Re-export commonly used items
pub use conformance::run_cache_contract_suite;
pub use time::MockClock;

// The production clock types live in `resilience`; re-exported here so test
// code can import everything clock-related from one path.
pub use crate::resilience::{Clock, SystemClock};
