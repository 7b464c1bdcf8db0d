//! In-process cache store
//!
//! Fallback backend used when the distributed store is unreachable at
//! startup, and the default store in tests. Expiry is lazy: entries are
//! checked against the clock on access and treated as absent once stale.
//! A periodic [`MemoryCache::purge_expired`] sweep reclaims the memory of
//! entries nobody reads again.

use std::collections::hash_map::Entry as MapSlot;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::store::{CacheError, CacheResult, CacheStore, KeyTtl};
use crate::resilience::{Clock, SystemClock};

/// Entry stored in the cache.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Thread-safe in-process key-value store with per-key TTL.
///
/// # Type Parameters
/// - `C`: Clock for time-based operations (defaults to `SystemClock`)
pub struct MemoryCache<C: Clock = SystemClock> {
    entries: RwLock<HashMap<String, Entry>>,
    clock: C,
}

impl MemoryCache<SystemClock> {
    /// Create a new store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCache<C> {
    /// Create a new store with a custom clock (useful for testing).
    pub fn with_clock(clock: C) -> Self {
        Self { entries: RwLock::new(HashMap::new()), clock }
    }

    /// Remove every entry whose TTL has elapsed and return how many were
    /// dropped. Called on an interval by the cache runtime; correctness
    /// never depends on it because reads ignore stale entries anyway.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of entries currently held, live or not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn expiry_for(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|d| self.clock.now() + d)
    }
}

#[async_trait]
impl<C: Clock> CacheStore for MemoryCache<C> {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let stale = matches!(entries.get(key), Some(entry) if entry.is_expired(now));
        if stale {
            entries.remove(key);
            return Ok(None);
        }

        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = self.expiry_for(ttl);
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry_for(ttl);
        // Check and write under a single write-lock acquisition so exactly
        // one concurrent caller can win on a missing key.
        let mut entries = self.entries.write();

        let live = entries.get(key).is_some_and(|entry| !entry.is_expired(now));
        if live {
            return Ok(false);
        }

        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        match entries.entry(key.to_string()) {
            MapSlot::Occupied(mut slot) => {
                // Missing and expired keys both restart the counter at one,
                // with no expiry until a caller attaches one.
                if slot.get().is_expired(now) {
                    slot.insert(Entry { value: "1".to_string(), expires_at: None });
                    return Ok(1);
                }
                let current: i64 = slot.get().value.parse().map_err(|_| {
                    CacheError::InvalidValue(format!(
                        "key '{key}' holds a non-integer value, cannot increment"
                    ))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    CacheError::Command(format!("increment overflow on key '{key}'"))
                })?;
                slot.get_mut().value = next.to_string();
                Ok(next)
            }
            MapSlot::Vacant(slot) => {
                slot.insert(Entry { value: "1".to_string(), expires_at: None });
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let now = self.clock.now();
        let entries = self.entries.read();

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => Ok(KeyTtl::Missing),
            Some(entry) => match entry.expires_at {
                Some(deadline) => Ok(KeyTtl::Remaining(deadline.saturating_duration_since(now))),
                None => Ok(KeyTtl::NoExpiry),
            },
            None => Ok(KeyTtl::Missing),
        }
    }
}
