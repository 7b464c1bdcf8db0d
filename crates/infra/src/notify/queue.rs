//! Cache-backed notification retry queue
//!
//! Each item lives under `notify:queue:item:{seq}`, with `seq` taken from
//! an atomic `increment` on `notify:queue:seq`. Discovery walks the seq
//! range from the head pointer (`notify:queue:head`) to the counter, so
//! the queue needs nothing beyond the cache contract, no key scans.
//! Completed slots read as holes; the head advances only over the leading
//! run of them.
//!
//! The sweep enforces the logical lifetime (24 h) and escalates a dying
//! item with its full payload; the storage TTL carries a grace hour so the
//! cache cannot evict the JSON before the sweep has had its chance.

use std::sync::Arc;
use std::time::Duration;

use caregate_common::cache::{CacheError, CacheStore};
use caregate_common::resilience::{Clock, SystemClock};
use caregate_domain::constants::{
    QUEUE_BACKOFF_SCHEDULE_SECS, QUEUE_HEAD_KEY, QUEUE_ITEM_PREFIX, QUEUE_SEQ_KEY,
    QUEUE_TTL_GRACE_SECS,
};
use caregate_domain::{CareGateError, QueueSettings, Result};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::sender::{EscalationReason, EscalationSink, NotificationSender};
use super::types::{NotificationChannel, ProcessReport, QueueItem, QueueStatus};

/// What a sweep did with one seq slot.
enum SlotOutcome {
    /// The slot no longer holds an item; the head may move past it.
    Removed,
    /// An item remains in the slot; the head must not pass it.
    Kept,
}

/// Retry queue over the shared cache.
pub struct NotificationQueue<C: Clock = SystemClock> {
    store: Arc<dyn CacheStore>,
    sender: Arc<dyn NotificationSender>,
    sink: Arc<dyn EscalationSink>,
    clock: C,
    max_attempts: u32,
    item_ttl: Duration,
    storage_grace: Duration,
}

impl NotificationQueue<SystemClock> {
    pub fn new(
        store: Arc<dyn CacheStore>,
        sender: Arc<dyn NotificationSender>,
        sink: Arc<dyn EscalationSink>,
        settings: &QueueSettings,
    ) -> Self {
        Self::with_clock(store, sender, sink, settings, SystemClock)
    }
}

impl<C: Clock> NotificationQueue<C> {
    pub fn with_clock(
        store: Arc<dyn CacheStore>,
        sender: Arc<dyn NotificationSender>,
        sink: Arc<dyn EscalationSink>,
        settings: &QueueSettings,
        clock: C,
    ) -> Self {
        Self {
            store,
            sender,
            sink,
            clock,
            max_attempts: settings.max_attempts,
            item_ttl: Duration::from_secs(settings.item_ttl_secs),
            storage_grace: Duration::from_secs(QUEUE_TTL_GRACE_SECS),
        }
    }

    /// Store a notification. The first delivery attempt comes due one
    /// backoff step after creation.
    ///
    /// # Errors
    /// `Transient` when the cache is unavailable.
    pub async fn enqueue(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        payload: Value,
    ) -> Result<Uuid> {
        let seq = self.store.increment(QUEUE_SEQ_KEY).await.map_err(queue_cache_err)?;
        let item = QueueItem {
            id: Uuid::new_v4(),
            channel,
            recipient: recipient.to_string(),
            payload,
            attempts: 0,
            created_at_ms: self.clock.millis_since_epoch(),
            last_attempt_at_ms: None,
            errors: Vec::new(),
        };
        let body = serde_json::to_string(&item)
            .map_err(|e| CareGateError::Internal(format!("failed to encode queue item: {e}")))?;
        self.store
            .set(&item_key(seq), &body, Some(self.item_ttl + self.storage_grace))
            .await
            .map_err(queue_cache_err)?;
        debug!(item_id = %item.id, seq, channel = ?item.channel, "notification enqueued");
        Ok(item.id)
    }

    /// One sweep: walk every live item, attempt the due ones, escalate the
    /// dead ones, and advance the head pointer over completed slots.
    ///
    /// # Errors
    /// `Transient` when the queue pointers cannot be read; per-item cache
    /// trouble is logged and the sweep continues.
    pub async fn process_queue(&self) -> Result<ProcessReport> {
        let (head, tail) = self.bounds().await?;
        let now_ms = self.clock.millis_since_epoch();
        let mut report = ProcessReport::default();

        let mut next_head = head;
        let mut leading_run = true;

        for seq in head..=tail {
            match self.sweep_slot(seq, now_ms, &mut report).await {
                SlotOutcome::Removed if leading_run => next_head = seq + 1,
                SlotOutcome::Removed => {}
                SlotOutcome::Kept => leading_run = false,
            }
        }

        if next_head > head {
            if let Err(e) =
                self.store.set(QUEUE_HEAD_KEY, &next_head.to_string(), None).await
            {
                warn!(error = %e, "failed to advance queue head");
            }
        }

        Ok(report)
    }

    /// Counts and item snapshots; attempts nothing.
    ///
    /// # Errors
    /// `Transient` when the cache is unavailable.
    pub async fn queue_status(&self) -> Result<QueueStatus> {
        let (head, tail) = self.bounds().await?;
        let mut items = Vec::new();
        let mut pending = 0usize;
        let mut failed = 0usize;

        for seq in head..=tail {
            match self.store.get(&item_key(seq)).await {
                Ok(Some(raw)) => match serde_json::from_str::<QueueItem>(&raw) {
                    Ok(item) => {
                        if item.attempts == 0 {
                            pending += 1;
                        } else {
                            failed += 1;
                        }
                        items.push(item);
                    }
                    Err(e) => warn!(seq, error = %e, "unreadable queue item in status scan"),
                },
                Ok(None) => {}
                Err(e) => return Err(queue_cache_err(e)),
            }
        }

        Ok(QueueStatus { total: items.len(), pending, failed, items })
    }

    async fn sweep_slot(
        &self,
        seq: i64,
        now_ms: u64,
        report: &mut ProcessReport,
    ) -> SlotOutcome {
        let key = item_key(seq);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return SlotOutcome::Removed,
            Err(e) => {
                warn!(error = %e, seq, "queue read failed mid-sweep");
                // Unknown contents; the head must not pass this slot.
                return SlotOutcome::Kept;
            }
        };

        let mut item: QueueItem = match serde_json::from_str(&raw) {
            Ok(item) => item,
            Err(e) => {
                // Unreadable payloads can be neither retried nor escalated
                // with data.
                error!(seq, error = %e, "dropping unreadable queue item");
                report.processed += 1;
                report.failed += 1;
                return self.remove_slot(&key).await;
            }
        };

        report.processed += 1;

        // The absolute lifetime wins over everything else, attempts
        // included.
        let age_ms = now_ms.saturating_sub(item.created_at_ms);
        if age_ms >= self.item_ttl.as_millis() as u64 {
            self.sink.escalate(&item, EscalationReason::Expired).await;
            report.failed += 1;
            return self.remove_slot(&key).await;
        }

        if item.attempts >= self.max_attempts {
            // Stored items normally hold attempts below the budget; this
            // guards slots written by an older process.
            self.sink.escalate(&item, EscalationReason::AttemptsExhausted).await;
            report.failed += 1;
            return self.remove_slot(&key).await;
        }

        if !self.is_due(&item, now_ms) {
            return SlotOutcome::Kept;
        }

        match self.sender.send(&item).await {
            Ok(()) => {
                debug!(item_id = %item.id, seq, "notification delivered");
                report.succeeded += 1;
                self.remove_slot(&key).await
            }
            Err(reason) => {
                report.failed += 1;
                item.attempts += 1;
                item.last_attempt_at_ms = Some(now_ms);
                item.errors.push(reason);

                if item.attempts >= self.max_attempts {
                    self.sink.escalate(&item, EscalationReason::AttemptsExhausted).await;
                    return self.remove_slot(&key).await;
                }

                self.persist_updated(&key, &item, age_ms).await;
                SlotOutcome::Kept
            }
        }
    }

    fn is_due(&self, item: &QueueItem, now_ms: u64) -> bool {
        // The delay for the current attempt count runs from the last
        // attempt (creation for a never-attempted item); the last schedule
        // step repeats for any attempts beyond the schedule.
        let since_ms = item.last_attempt_at_ms.unwrap_or(item.created_at_ms);
        let index =
            (item.attempts as usize).min(QUEUE_BACKOFF_SCHEDULE_SECS.len() - 1);
        let backoff_ms = QUEUE_BACKOFF_SCHEDULE_SECS[index] * 1000;
        now_ms >= since_ms.saturating_add(backoff_ms)
    }

    /// Rewrite a mutated item under its remaining storage window. The
    /// rewrite never extends the absolute lifetime.
    async fn persist_updated(&self, key: &str, item: &QueueItem, age_ms: u64) {
        let total_ms = (self.item_ttl + self.storage_grace).as_millis() as u64;
        let remaining = Duration::from_millis(total_ms.saturating_sub(age_ms).max(1000));
        match serde_json::to_string(item) {
            Ok(body) => {
                if let Err(e) = self.store.set(key, &body, Some(remaining)).await {
                    warn!(error = %e, item_id = %item.id, "failed to persist updated queue item");
                }
            }
            Err(e) => warn!(error = %e, item_id = %item.id, "failed to encode updated queue item"),
        }
    }

    /// A slot whose delete fails stays `Kept` so the next sweep retries the
    /// removal instead of the head silently stranding the item.
    async fn remove_slot(&self, key: &str) -> SlotOutcome {
        match self.store.delete(key).await {
            Ok(()) => SlotOutcome::Removed,
            Err(e) => {
                warn!(error = %e, key, "failed to delete queue slot");
                SlotOutcome::Kept
            }
        }
    }

    async fn bounds(&self) -> Result<(i64, i64)> {
        let tail = self.read_counter(QUEUE_SEQ_KEY).await?.unwrap_or(0);
        let head = self.read_counter(QUEUE_HEAD_KEY).await?.unwrap_or(1);
        Ok((head, tail))
    }

    async fn read_counter(&self, key: &str) -> Result<Option<i64>> {
        match self.store.get(key).await.map_err(queue_cache_err)? {
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                CareGateError::Internal(format!("corrupt queue pointer {key}: {raw}"))
            }),
            None => Ok(None),
        }
    }
}

fn item_key(seq: i64) -> String {
    format!("{QUEUE_ITEM_PREFIX}{seq}")
}

fn queue_cache_err(e: CacheError) -> CareGateError {
    CareGateError::Transient(format!("notification queue cache error: {e}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use caregate_common::cache::MemoryCache;
    use caregate_common::testing::MockClock;
    use serde_json::json;

    use super::*;

    /// Fails every delivery whose recipient is on the deny list; counts all
    /// calls.
    struct ScriptedSender {
        deny: Vec<&'static str>,
        calls: AtomicU32,
    }

    impl ScriptedSender {
        fn deliver_all() -> Self {
            Self { deny: Vec::new(), calls: AtomicU32::new(0) }
        }

        fn deny(recipients: Vec<&'static str>) -> Self {
            Self { deny: recipients, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl NotificationSender for ScriptedSender {
        async fn send(&self, item: &QueueItem) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.deny.iter().any(|&d| d == item.recipient) {
                Err(format!("gateway refused {}", item.recipient))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(Uuid, EscalationReason)>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<(Uuid, EscalationReason)> {
            self.events.lock().expect("mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl EscalationSink for RecordingSink {
        async fn escalate(&self, item: &QueueItem, reason: EscalationReason) {
            self.events.lock().expect("mutex poisoned").push((item.id, reason));
        }
    }

    struct Harness {
        queue: NotificationQueue<MockClock>,
        clock: MockClock,
        sender: Arc<ScriptedSender>,
        sink: Arc<RecordingSink>,
        store: Arc<dyn CacheStore>,
    }

    fn harness(sender: ScriptedSender) -> Harness {
        harness_with_settings(sender, QueueSettings::default())
    }

    fn harness_with_settings(sender: ScriptedSender, settings: QueueSettings) -> Harness {
        let clock = MockClock::new();
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::with_clock(clock.clone()));
        let sender = Arc::new(sender);
        let sink = Arc::new(RecordingSink::default());
        let queue = NotificationQueue::with_clock(
            Arc::clone(&store),
            Arc::clone(&sender) as Arc<dyn NotificationSender>,
            Arc::clone(&sink) as Arc<dyn EscalationSink>,
            &settings,
            clock.clone(),
        );
        Harness { queue, clock, sender, sink, store }
    }

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    #[tokio::test]
    async fn successful_sweep_delivers_and_clears_the_slot() {
        let h = harness(ScriptedSender::deliver_all());
        h.queue
            .enqueue(NotificationChannel::Email, "a@clinic.test", json!({"t": "hi"}))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(300));
        let report = h.queue.process_queue().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(h.queue.queue_status().await.unwrap().total, 0);

        // The next sweep starts past the completed slot.
        let report = h.queue.process_queue().await.unwrap();
        assert_eq!(report.processed, 0);
    }

    #[tokio::test]
    async fn failed_attempt_records_the_error_and_waits_out_the_backoff() {
        let h = harness(ScriptedSender::deny(vec!["b@clinic.test"]));
        h.queue
            .enqueue(NotificationChannel::WhatsApp, "b@clinic.test", json!({}))
            .await
            .unwrap();

        // A fresh item is not touched before its five minutes are up.
        h.clock.advance(Duration::from_secs(299));
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 0);

        h.clock.advance(Duration::from_secs(1));
        let report = h.queue.process_queue().await.unwrap();
        assert_eq!(report.failed, 1);

        let status = h.queue.queue_status().await.unwrap();
        assert_eq!(status.failed, 1);
        assert_eq!(status.items[0].attempts, 1);
        assert_eq!(status.items[0].errors.len(), 1);
        assert!(status.items[0].errors[0].contains("gateway refused"));

        // Within the fifteen-minute backoff nothing more is attempted.
        h.clock.advance(Duration::from_secs(899));
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 1);

        // At the boundary the retry fires.
        h.clock.advance(Duration::from_secs(1));
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn third_failure_escalates_and_removes_the_item() {
        let h = harness(ScriptedSender::deny(vec!["c@clinic.test"]));
        let id = h
            .queue
            .enqueue(NotificationChannel::Email, "c@clinic.test", json!({}))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(300));
        h.queue.process_queue().await.unwrap();
        h.clock.advance(Duration::from_secs(900));
        h.queue.process_queue().await.unwrap();
        h.clock.advance(Duration::from_secs(3600));
        h.queue.process_queue().await.unwrap();

        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.sink.events(), vec![(id, EscalationReason::AttemptsExhausted)]);
        assert_eq!(h.queue.queue_status().await.unwrap().total, 0);

        // Nothing left to retry.
        h.clock.advance(Duration::from_secs(3600));
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_item_follows_the_full_schedule_under_frequent_sweeps() {
        let h = harness(ScriptedSender::deny(vec!["g@clinic.test"]));
        let id = h
            .queue
            .enqueue(NotificationChannel::Email, "g@clinic.test", json!({}))
            .await
            .unwrap();

        // Sweep every minute; the schedule, not the polling rate, decides
        // when delivery is attempted.
        let mut attempt_minutes = Vec::new();
        for minute in 0..=100u64 {
            let before = h.sender.calls.load(Ordering::SeqCst);
            h.queue.process_queue().await.unwrap();
            if h.sender.calls.load(Ordering::SeqCst) > before {
                attempt_minutes.push(minute);
            }
            h.clock.advance(Duration::from_secs(60));
        }

        assert_eq!(attempt_minutes, vec![5, 20, 80]);
        assert_eq!(h.sink.events(), vec![(id, EscalationReason::AttemptsExhausted)]);
        assert_eq!(h.queue.queue_status().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn expired_item_escalates_without_a_delivery_attempt() {
        let h = harness(ScriptedSender::deliver_all());
        let id = h
            .queue
            .enqueue(NotificationChannel::Email, "d@clinic.test", json!({}))
            .await
            .unwrap();

        h.clock.advance(Duration::from_millis(DAY_MS));
        let report = h.queue.process_queue().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sink.events(), vec![(id, EscalationReason::Expired)]);
        assert_eq!(h.queue.queue_status().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn the_absolute_lifetime_beats_a_due_retry() {
        let h = harness(ScriptedSender::deny(vec!["e@clinic.test"]));
        let id = h
            .queue
            .enqueue(NotificationChannel::Email, "e@clinic.test", json!({}))
            .await
            .unwrap();

        // One failed attempt, then the item quietly ages out.
        h.clock.advance(Duration::from_secs(300));
        h.queue.process_queue().await.unwrap();
        h.clock.advance(Duration::from_millis(DAY_MS));
        h.queue.process_queue().await.unwrap();

        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.events(), vec![(id, EscalationReason::Expired)]);
    }

    #[tokio::test]
    async fn backoff_clamps_at_the_last_schedule_step() {
        let h = harness_with_settings(
            ScriptedSender::deliver_all(),
            QueueSettings { max_attempts: 5, ..QueueSettings::default() },
        );
        let item = QueueItem {
            id: Uuid::new_v4(),
            channel: NotificationChannel::Email,
            recipient: "f@clinic.test".to_string(),
            payload: json!({}),
            attempts: 4,
            created_at_ms: 0,
            last_attempt_at_ms: Some(0),
            errors: Vec::new(),
        };

        // Attempt five waits the clamped 60 minutes, not some larger step.
        assert!(!h.queue.is_due(&item, 59 * 60 * 1000));
        assert!(h.queue.is_due(&item, 60 * 60 * 1000));
    }

    #[tokio::test]
    async fn head_advances_only_over_the_leading_completed_run() {
        let h = harness(ScriptedSender::deny(vec!["second@clinic.test"]));
        h.queue
            .enqueue(NotificationChannel::Email, "first@clinic.test", json!({}))
            .await
            .unwrap();
        h.queue
            .enqueue(NotificationChannel::Email, "second@clinic.test", json!({}))
            .await
            .unwrap();
        h.queue
            .enqueue(NotificationChannel::Email, "third@clinic.test", json!({}))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(300));
        let report = h.queue.process_queue().await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);

        // Slot 1 completed, slot 2 is retained, slot 3 completed: the head
        // stops at the retained slot.
        assert_eq!(h.store.get(QUEUE_HEAD_KEY).await.unwrap().as_deref(), Some("2"));

        // A sweep that keeps slot 2 does not move the head over the hole at
        // slot 3.
        h.queue.process_queue().await.unwrap();
        assert_eq!(h.store.get(QUEUE_HEAD_KEY).await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn unreadable_items_are_dropped_not_retried() {
        let h = harness(ScriptedSender::deliver_all());
        h.store.set(QUEUE_SEQ_KEY, "1", None).await.unwrap();
        h.store.set(&item_key(1), "not json", None).await.unwrap();

        let report = h.queue.process_queue().await.unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.store.get(&item_key(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn queue_status_splits_pending_from_failed() {
        let h = harness(ScriptedSender::deny(vec!["retry@clinic.test"]));
        h.queue
            .enqueue(NotificationChannel::Email, "retry@clinic.test", json!({}))
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(300));
        h.queue.process_queue().await.unwrap();
        h.queue
            .enqueue(NotificationChannel::WhatsApp, "fresh@clinic.test", json!({}))
            .await
            .unwrap();

        let status = h.queue.queue_status().await.unwrap();

        assert_eq!(status.total, 2);
        assert_eq!(status.failed, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(h.sender.calls.load(Ordering::SeqCst), 1);
    }
}
