//! # CareGate Infrastructure
//!
//! Infrastructure implementations of the CareGate coordination layer.
//!
//! This crate contains:
//! - Cache backends (Redis plus the in-process fallback wiring)
//! - Provider OAuth2 client and the cache-backed token lifecycle
//! - Notification retry queue and its background worker
//! - Environment-based configuration loading
//!
//! ## Architecture
//! - Implements against the contracts in `caregate-common`
//! - Depends on `caregate-common` and `caregate-domain`
//! - Contains all "impure" code (network I/O, environment access)

pub mod cache;
pub mod config;
pub mod notify;
pub mod provider;

// Re-export commonly used items
pub use cache::{connect_cache, CacheBackend, CacheRuntime, ConnectedCache, RedisCache};
pub use config::load;
pub use notify::{
    EscalationReason, EscalationSink, LogEscalation, LogSender, NotificationChannel,
    NotificationQueue, NotificationSender, ProcessReport, QueueItem, QueueStatus, QueueWorker,
};
pub use provider::{AuthGrant, ProviderAuthClient, TokenManager, TokenStatus};
