//! Cache backends and startup wiring
//!
//! The backend is chosen exactly once, at startup: the factory probes the
//! configured Redis and, when the probe fails, falls back to the in-process
//! store instead of refusing to boot. Callers only ever see the
//! [`CacheStore`] contract, so nothing downstream knows which backend won.
//!
//! The fallback trades cross-instance coordination for availability: locks,
//! rate-limit counters, and queue state become per-process until the next
//! restart finds Redis reachable again.

mod redis;
mod runtime;

use std::sync::Arc;

use caregate_common::cache::{CacheStore, MemoryCache};
use caregate_domain::CacheSettings;
use tracing::{info, warn};

pub use self::redis::RedisCache;
pub use self::runtime::CacheRuntime;

/// Which backend the startup probe selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    /// Distributed backend, shared across instances.
    Redis,
    /// In-process fallback, local to this instance.
    Memory,
}

impl CacheBackend {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the startup probe: the store plus the pieces the API layer
/// needs to report and maintain it.
pub struct ConnectedCache {
    /// The selected backend behind the shared contract.
    pub store: Arc<dyn CacheStore>,
    /// Which backend won, for health reporting.
    pub backend: CacheBackend,
    /// Sweeper for the in-process store; `None` on the Redis backend, which
    /// expires keys server-side.
    pub sweeper: Option<CacheRuntime>,
}

/// Probe Redis once and fall back to the in-process store on any failure.
///
/// Never returns an error: an unreachable cache degrades coordination, it
/// does not take the service down.
pub async fn connect_cache(settings: &CacheSettings) -> ConnectedCache {
    match RedisCache::connect(settings).await {
        Ok(store) => {
            info!(backend = "redis", "cache backend selected");
            ConnectedCache {
                store: Arc::new(store),
                backend: CacheBackend::Redis,
                sweeper: None,
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                backend = "memory",
                "Redis unreachable, falling back to in-process cache"
            );
            let memory = Arc::new(MemoryCache::new());
            let sweeper = CacheRuntime::new(Arc::clone(&memory), settings.memory_sweep_interval_secs);
            ConnectedCache {
                store: memory,
                backend: CacheBackend::Memory,
                sweeper: Some(sweeper),
            }
        }
    }
}
