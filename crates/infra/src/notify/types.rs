//! Queue item and report types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Delivery channel for a queued notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    WhatsApp,
}

/// One undelivered notification, stored as JSON in the cache.
///
/// Timestamps are milliseconds since the UNIX epoch, taken from the queue's
/// clock so tests can steer them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub channel: NotificationChannel,
    pub recipient: String,
    /// Channel-specific body, opaque to the queue.
    pub payload: Value,
    /// Completed delivery attempts so far.
    pub attempts: u32,
    pub created_at_ms: u64,
    pub last_attempt_at_ms: Option<u64>,
    /// One entry per failed attempt, oldest first.
    pub errors: Vec<String>,
}

/// Outcome of one sweep over the queue.
///
/// `processed` counts live items inspected; items skipped because their
/// backoff has not elapsed are processed but neither succeeded nor failed.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ProcessReport {
    pub processed: u32,
    pub succeeded: u32,
    /// Failed attempts plus escalations (exhausted, expired, unreadable).
    pub failed: u32,
}

/// Snapshot of the queue without any delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    /// Items still awaiting their first attempt.
    pub pending: usize,
    /// Items in retry backoff after at least one failure.
    pub failed: usize,
    pub items: Vec<QueueItem>,
}
