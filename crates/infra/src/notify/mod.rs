//! Notification retry queue
//!
//! Booking confirmations that fail to send are parked in the shared cache
//! and retried on a widening schedule by a background sweep. Items that
//! exhaust their attempts or outlive their 24-hour window are handed to an
//! escalation sink for manual follow-up; nothing is retried forever.
//!
//! - [`NotificationQueue`]: cache-backed storage, sweep, and status
//! - [`QueueWorker`]: background task driving periodic sweeps
//! - [`NotificationSender`] / [`EscalationSink`]: delivery and escalation
//!   seams implemented by the hosting application

mod queue;
mod sender;
mod types;
mod worker;

pub use queue::NotificationQueue;
pub use sender::{EscalationReason, EscalationSink, LogEscalation, LogSender, NotificationSender};
pub use types::{NotificationChannel, ProcessReport, QueueItem, QueueStatus};
pub use worker::QueueWorker;
