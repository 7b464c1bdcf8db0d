//! Cache store contract shared by every backend

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Cache-layer errors (transport/command/value).
///
/// Kept independent from the domain error so each consumer decides its own
/// failure mode: the rate limiter fails open, the token manager maps to
/// `Transient`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// The backend rejected or failed the command.
    #[error("cache command error: {0}")]
    Command(String),

    /// The stored value does not fit the operation (e.g. incrementing a
    /// non-integer).
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and expires after this duration.
    Remaining(Duration),
    /// Key exists and never expires.
    NoExpiry,
    /// Key does not exist, or its TTL has already elapsed.
    Missing,
}

impl KeyTtl {
    /// Remaining whole seconds, if the key exists with an expiry.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u64> {
        match self {
            Self::Remaining(d) => Some(d.as_secs()),
            Self::NoExpiry | Self::Missing => None,
        }
    }
}

/// Abstract cache store interface.
///
/// All operations are async and fallible. Implementations must be
/// thread-safe and must keep the semantics below exactly, so that consumers
/// behave identically on every backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Get a value by key.
    ///
    /// Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value, replacing any previous value and TTL.
    ///
    /// If `ttl` is `None`, the key lives until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Set the value only if the key does not currently exist.
    ///
    /// The existence check and the write are one atomic step: under
    /// concurrency exactly one caller wins on a missing key. A rejected
    /// call leaves the stored value and TTL untouched. A key whose TTL has
    /// elapsed counts as absent, and a winning call grants the full `ttl`
    /// again.
    ///
    /// Returns `true` when the value was written.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<bool>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically add one to the integer stored at `key` and return the new
    /// value.
    ///
    /// A missing key is created at `1` with no expiry. An existing key
    /// keeps whatever TTL it has.
    ///
    /// # Errors
    /// `CacheError::InvalidValue` when the stored value is not an integer.
    async fn increment(&self, key: &str) -> CacheResult<i64>;

    /// Attach or replace the TTL of an existing key.
    ///
    /// Returns `false` (and changes nothing) when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_secs_only_for_expiring_keys() {
        assert_eq!(KeyTtl::Remaining(Duration::from_secs(42)).remaining_secs(), Some(42));
        assert_eq!(KeyTtl::NoExpiry.remaining_secs(), None);
        assert_eq!(KeyTtl::Missing.remaining_secs(), None);
    }

    #[test]
    fn errors_render_their_class() {
        let err = CacheError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "cache connection error: refused");

        let err = CacheError::InvalidValue("not an integer".to_string());
        assert!(err.to_string().starts_with("cache value error"));
    }
}
