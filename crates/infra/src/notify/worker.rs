//! Background sweep driver for the notification queue
//!
//! Same coordinator-plus-worker split as the cache sweeper, with a
//! shutdown flag and a [`Notify`] so `stop()` wakes the loop instead of
//! waiting out the current interval.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use caregate_common::resilience::{Clock, SystemClock};
use caregate_domain::{CareGateError, Result};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::queue::NotificationQueue;

/// Periodic sweep driver for a [`NotificationQueue`].
pub struct QueueWorker<C: Clock = SystemClock> {
    queue: Arc<NotificationQueue<C>>,
    interval_secs: u64,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
}

impl<C: Clock> QueueWorker<C> {
    /// Create a worker sweeping `queue` every `interval_secs`.
    pub fn new(queue: Arc<NotificationQueue<C>>, interval_secs: u64) -> Self {
        Self {
            queue,
            interval_secs,
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            task_handle: None,
        }
    }

    /// Start the background sweep task.
    ///
    /// # Errors
    /// `CareGateError::Internal` when the worker is already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(CareGateError::Internal("queue worker already running".to_string()));
        }

        self.shutdown.store(false, AtomicOrdering::Relaxed);

        let queue = Arc::clone(&self.queue);
        let interval = Duration::from_secs(self.interval_secs);
        let shutdown = Arc::clone(&self.shutdown);
        let notify = Arc::clone(&self.notify);

        info!(interval_secs = self.interval_secs, "starting notification queue worker");

        let handle = tokio::spawn(async move {
            queue_worker(queue, interval, shutdown, notify).await;
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the sweep task and wait for it to finish.
    ///
    /// # Errors
    /// `CareGateError::Internal` on shutdown timeout or join failure.
    pub async fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, AtomicOrdering::Relaxed);
        self.notify.notify_waiters();

        if let Some(handle) = self.task_handle.take() {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .map_err(|_| {
                    CareGateError::Internal("queue worker shutdown timeout".to_string())
                })?
                .map_err(|e| CareGateError::Internal(format!("task join failed: {e}")))?;
        }

        info!("notification queue worker stopped");
        Ok(())
    }

    /// Check if the worker is currently running.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some() && !self.shutdown.load(AtomicOrdering::Relaxed)
    }
}

/// Pure async worker that sweeps the queue until the shutdown flag is set.
async fn queue_worker<C: Clock>(
    queue: Arc<NotificationQueue<C>>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick resolves immediately; consume it so the first sweep
    // waits a full period.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = notify.notified() => {}
        }

        if shutdown.load(AtomicOrdering::Relaxed) {
            break;
        }

        match queue.process_queue().await {
            Ok(report) if report.processed > 0 => {
                info!(
                    processed = report.processed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "notification sweep finished"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "notification sweep failed"),
        }
    }

    debug!("notification queue worker shutting down");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use caregate_common::cache::{CacheStore, MemoryCache};
    use caregate_common::testing::MockClock;
    use caregate_domain::QueueSettings;
    use serde_json::json;

    use super::super::sender::{LogEscalation, NotificationSender};
    use super::super::types::{NotificationChannel, QueueItem};
    use super::*;

    struct CountingSender {
        calls: AtomicU32,
    }

    #[async_trait]
    impl NotificationSender for CountingSender {
        async fn send(&self, _item: &QueueItem) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(())
        }
    }

    fn queue_with_sender(
        store: Arc<dyn CacheStore>,
        sender: Arc<CountingSender>,
    ) -> Arc<NotificationQueue> {
        Arc::new(NotificationQueue::new(
            store,
            sender,
            Arc::new(LogEscalation),
            &QueueSettings::default(),
        ))
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let sender = Arc::new(CountingSender { calls: AtomicU32::new(0) });
        let mut worker = QueueWorker::new(queue_with_sender(store, sender), 60);

        assert!(!worker.is_running());

        worker.start().await.unwrap();
        assert!(worker.is_running());

        // Can't start twice
        assert!(worker.start().await.is_err());

        worker.stop().await.unwrap();
        assert!(!worker.is_running());
    }

    #[tokio::test]
    async fn worker_delivers_queued_notifications() {
        let clock = MockClock::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::with_clock(clock.clone()));
        let sender = Arc::new(CountingSender { calls: AtomicU32::new(0) });
        let queue = Arc::new(NotificationQueue::with_clock(
            Arc::clone(&store),
            Arc::clone(&sender) as Arc<dyn NotificationSender>,
            Arc::new(LogEscalation),
            &QueueSettings::default(),
            clock.clone(),
        ));

        queue
            .enqueue(NotificationChannel::Email, "a@clinic.test", json!({"t": "hi"}))
            .await
            .unwrap();
        // Move past the first backoff step so the sweep finds the item due.
        clock.advance(Duration::from_secs(300));

        let shutdown = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let worker_queue = Arc::clone(&queue);
        let worker_shutdown = Arc::clone(&shutdown);
        let worker_notify = Arc::clone(&notify);
        let handle = tokio::spawn(async move {
            queue_worker(worker_queue, Duration::from_millis(10), worker_shutdown, worker_notify)
                .await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.store(true, AtomicOrdering::Relaxed);
        notify.notify_waiters();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;

        assert_eq!(sender.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(queue.queue_status().await.unwrap().total, 0);
    }
}
