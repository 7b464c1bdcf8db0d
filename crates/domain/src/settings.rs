//! Configuration management
//!
//! Typed settings for every subsystem. Values are loaded from the
//! environment by the infra layer; this module owns the shapes, the
//! defaults and the validation rules.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::errors::{CareGateError, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cache: CacheSettings,
    pub provider: ProviderSettings,
    pub rate_limit: RateLimitSettings,
    pub queue: QueueSettings,
    pub server: ServerSettings,
}

/// Cache backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Redis connection URL. The factory falls back to the in-process store
    /// when this backend cannot be reached at startup.
    pub redis_url: String,
    /// Prefix applied to every key stored in the distributed backend.
    pub key_prefix: String,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
    /// How often the in-process store purges expired entries.
    pub memory_sweep_interval_secs: u64,
}

/// Scheduling provider credentials and token lifecycle tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// OAuth2 token endpoint of the scheduling provider.
    pub token_url: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Seconds subtracted from the provider-reported access token lifetime
    /// so a token is refreshed before it actually expires.
    pub access_margin_secs: u64,
    /// Refresh token lifetime assumed when the provider does not report one.
    pub refresh_ttl_secs: u64,
    pub http_timeout_secs: u64,
}

/// Fixed-window rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Requests admitted per identity per window.
    pub max_requests: u32,
    pub window_secs: u64,
}

/// Notification retry queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Delivery attempts before an item is escalated and dropped.
    pub max_attempts: u32,
    /// Absolute item lifetime measured from enqueue, regardless of attempts.
    pub item_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: constants::CACHE_KEY_PREFIX.to_string(),
            connect_timeout_secs: constants::CACHE_CONNECT_TIMEOUT_SECS,
            response_timeout_secs: constants::CACHE_RESPONSE_TIMEOUT_SECS,
            memory_sweep_interval_secs: constants::MEMORY_SWEEP_INTERVAL_SECS,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: constants::RATE_LIMIT_MAX_REQUESTS,
            window_secs: constants::RATE_LIMIT_WINDOW_SECS,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: constants::QUEUE_MAX_ATTEMPTS,
            item_ttl_secs: constants::QUEUE_ITEM_TTL_SECS,
            sweep_interval_secs: constants::QUEUE_SWEEP_INTERVAL_SECS,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl Settings {
    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns `CareGateError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.provider.validate()?;
        self.rate_limit.validate()?;
        self.queue.validate()?;
        Ok(())
    }
}

impl CacheSettings {
    /// # Errors
    /// Returns `CareGateError::Config` if the URL or timeouts are unusable.
    pub fn validate(&self) -> Result<()> {
        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(CareGateError::Config(format!(
                "cache redis_url must use the redis:// scheme, got '{}'",
                self.redis_url
            )));
        }
        if self.connect_timeout_secs == 0 || self.response_timeout_secs == 0 {
            return Err(CareGateError::Config(
                "cache timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl ProviderSettings {
    /// # Errors
    /// Returns `CareGateError::Config` if credentials or the endpoint are
    /// missing.
    pub fn validate(&self) -> Result<()> {
        if !self.token_url.starts_with("http://") && !self.token_url.starts_with("https://") {
            return Err(CareGateError::Config(format!(
                "provider token_url must be an http(s) URL, got '{}'",
                self.token_url
            )));
        }
        if self.client_id.is_empty() {
            return Err(CareGateError::Config("provider client_id is empty".to_string()));
        }
        if self.username.is_empty() || self.password.is_empty() {
            return Err(CareGateError::Config(
                "provider username and password are required for the password grant".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(CareGateError::Config(
                "provider http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl RateLimitSettings {
    /// # Errors
    /// Returns `CareGateError::Config` if the window or quota is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(CareGateError::Config(
                "rate_limit max_requests must be greater than zero".to_string(),
            ));
        }
        if self.window_secs == 0 {
            return Err(CareGateError::Config(
                "rate_limit window_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl QueueSettings {
    /// # Errors
    /// Returns `CareGateError::Config` if attempt or TTL bounds are zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CareGateError::Config(
                "queue max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.item_ttl_secs == 0 {
            return Err(CareGateError::Config(
                "queue item_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CareGateError::Config(
                "queue sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
