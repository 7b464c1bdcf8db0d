//! Backend-agnostic key-value cache
//!
//! The coordination layer stores all of its shared state (provider tokens,
//! rate-limit counters, queued notifications) behind one small contract so
//! the backing store can be swapped without touching any consumer.
//!
//! # Backends
//!
//! - [`MemoryCache`]: in-process store with lazy TTL expiry, used as the
//!   fail-open fallback and in tests
//! - `RedisCache` (infra crate): distributed store shared by all instances
//!
//! Both backends keep identical observable semantics; the conformance suite
//! in [`crate::testing`] pins them down.
//!
//! # Values
//!
//! Values are UTF-8 strings: serialized JSON records or decimal counters.
//! Consumers own their encoding; the cache never inspects a value except in
//! [`CacheStore::increment`].

mod memory;
mod store;

// Re-export public API
pub use memory::MemoryCache;
pub use store::{CacheError, CacheResult, CacheStore, KeyTtl};
