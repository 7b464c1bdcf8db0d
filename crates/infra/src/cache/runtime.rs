//! Background sweeper for the in-process cache
//!
//! The in-process store expires keys lazily on access, so entries nobody
//! reads again would pile up for the life of the process. When the factory
//! falls back to the memory backend it attaches this runtime, which purges
//! stale entries on a fixed interval.
//!
//! Follows the worker pattern used across CareGate:
//! - `CacheRuntime`: lifecycle coordinator (owns the task handle)
//! - `sweep_worker()`: pure async worker function (easier to test)

use std::sync::Arc;
use std::time::Duration;

use caregate_common::cache::MemoryCache;
use caregate_common::resilience::{Clock, SystemClock};
use caregate_domain::{CareGateError, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Periodic purge driver for a [`MemoryCache`].
pub struct CacheRuntime<C: Clock = SystemClock> {
    store: Arc<MemoryCache<C>>,
    interval_secs: u64,
    task_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl<C: Clock> CacheRuntime<C> {
    /// Create a runtime sweeping `store` every `interval_secs`.
    pub fn new(store: Arc<MemoryCache<C>>, interval_secs: u64) -> Self {
        Self { store, interval_secs, task_handle: None, cancellation: CancellationToken::new() }
    }

    /// Start the background sweep task.
    ///
    /// # Errors
    /// `CareGateError::Internal` when the runtime is already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(CareGateError::Internal("cache sweeper already running".to_string()));
        }

        let cancel = self.cancellation.clone();
        let store = Arc::clone(&self.store);
        let interval = Duration::from_secs(self.interval_secs);

        info!(interval_secs = self.interval_secs, "starting cache sweeper");

        let handle = tokio::spawn(async move {
            sweep_worker(store, interval, cancel).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the sweep task and wait for it to finish.
    ///
    /// # Errors
    /// `CareGateError::Internal` on shutdown timeout or join failure.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .map_err(|_| {
                    CareGateError::Internal("cache sweeper shutdown timeout".to_string())
                })?
                .map_err(|e| CareGateError::Internal(format!("task join failed: {e}")))?;
        }

        info!("cache sweeper stopped");
        Ok(())
    }

    /// Check if the sweeper is currently running.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some() && !self.cancellation.is_cancelled()
    }
}

/// Pure async worker that purges expired entries until cancelled.
async fn sweep_worker<C: Clock>(
    store: Arc<MemoryCache<C>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("cache sweeper worker shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, "purged expired cache entries");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use caregate_common::cache::CacheStore;
    use caregate_common::testing::MockClock;

    use super::*;

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let store = Arc::new(MemoryCache::new());
        let mut runtime = CacheRuntime::new(store, 60);

        assert!(!runtime.is_running());

        runtime.start().await.unwrap();
        assert!(runtime.is_running());

        // Can't start twice
        assert!(runtime.start().await.is_err());

        runtime.stop().await.unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn worker_purges_entries_once_the_clock_passes_their_expiry() {
        let clock = MockClock::new();
        let store = Arc::new(MemoryCache::with_clock(clock.clone()));

        store.set("stale", "v", Some(Duration::from_secs(1))).await.unwrap();
        store.set("fresh", "v", Some(Duration::from_secs(3600))).await.unwrap();
        clock.advance(Duration::from_secs(2));

        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let worker_store = Arc::clone(&store);
        let handle = tokio::spawn(async move {
            sweep_worker(worker_store, Duration::from_millis(10), worker_cancel).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("fresh").await.unwrap().as_deref(), Some("v"));
    }
}
