//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! service. Cache keys are namespaced so the token, rate-limit and queue
//! subsystems never collide inside a shared backend.

// Token lifecycle cache keys
pub const ACCESS_TOKEN_KEY: &str = "auth:access_token";
pub const REFRESH_TOKEN_KEY: &str = "auth:refresh_token";
pub const REFRESH_LOCK_KEY: &str = "auth:refresh_lock";

// Rate limiter cache keys
pub const RATE_LIMIT_PREFIX: &str = "ratelimit:";

// Notification queue cache keys
pub const QUEUE_ITEM_PREFIX: &str = "notify:queue:item:";
pub const QUEUE_SEQ_KEY: &str = "notify:queue:seq";
pub const QUEUE_HEAD_KEY: &str = "notify:queue:head";

// Token lifecycle defaults
pub const ACCESS_TOKEN_MARGIN_SECS: u64 = 60;
pub const REFRESH_TOKEN_FALLBACK_SECS: u64 = 30 * 24 * 60 * 60;
pub const REFRESH_LOCK_TTL_SECS: u64 = 5;
pub const REFRESH_LOCK_WAIT_MS: u64 = 500;

// Retry executor defaults
pub const RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: i32 = 3;

// Rate limiter defaults
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 30;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Hex characters of the hashed client identity kept in cache keys.
pub const RATE_LIMIT_IDENTITY_LEN: usize = 16;

// Notification queue defaults
pub const QUEUE_MAX_ATTEMPTS: u32 = 3;
pub const QUEUE_ITEM_TTL_SECS: u64 = 24 * 60 * 60;
/// Extra cache lifetime past the logical TTL so the sweep can still read an
/// expired item when it escalates it.
pub const QUEUE_TTL_GRACE_SECS: u64 = 60 * 60;
pub const QUEUE_BACKOFF_SCHEDULE_SECS: [u64; 3] = [5 * 60, 15 * 60, 60 * 60];
pub const QUEUE_SWEEP_INTERVAL_SECS: u64 = 60;

// HTTP defaults
pub const HTTP_TIMEOUT_SECS: u64 = 10;

// Cache defaults
pub const CACHE_KEY_PREFIX: &str = "caregate:";
pub const CACHE_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const CACHE_RESPONSE_TIMEOUT_SECS: u64 = 2;
pub const MEMORY_SWEEP_INTERVAL_SECS: u64 = 60;
