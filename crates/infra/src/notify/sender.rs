//! Delivery and escalation seams
//!
//! The queue never talks to a mail or messaging gateway itself; it drives a
//! [`NotificationSender`] and hands exhausted items to an [`EscalationSink`].
//! Production wires real transports in, tests wire in recorders.

use async_trait::async_trait;
use tracing::{error, info};

use super::types::QueueItem;

/// Transport capable of delivering one notification.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Attempt delivery once. The error string is recorded on the item and
    /// shown in escalations, so it should name the proximate cause.
    async fn send(&self, item: &QueueItem) -> Result<(), String>;
}

/// Stand-in transport until a gateway is wired up: records the delivery in
/// the log and reports success, so queues drain instead of backing up.
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, item: &QueueItem) -> Result<(), String> {
        info!(
            item_id = %item.id,
            channel = ?item.channel,
            recipient = %item.recipient,
            "notification delivered to the log transport"
        );
        Ok(())
    }
}

/// Why an item left the queue without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationReason {
    /// Every allowed attempt failed.
    AttemptsExhausted,
    /// The absolute item lifetime ran out, whatever the attempt count.
    Expired,
}

/// Receives items the queue gives up on.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    async fn escalate(&self, item: &QueueItem, reason: EscalationReason);
}

/// Default sink: a structured error record for the operations log.
///
/// The record carries everything needed to follow up by hand; the payload
/// itself stays out of the log.
pub struct LogEscalation;

#[async_trait]
impl EscalationSink for LogEscalation {
    async fn escalate(&self, item: &QueueItem, reason: EscalationReason) {
        error!(
            item_id = %item.id,
            channel = ?item.channel,
            recipient = %item.recipient,
            attempts = item.attempts,
            reason = ?reason,
            errors = ?item.errors,
            "notification escalated for manual follow-up"
        );
    }
}
