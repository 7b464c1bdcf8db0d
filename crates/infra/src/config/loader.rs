//! Configuration loader
//!
//! Loads the complete [`Settings`] tree from `CAREGATE_*` environment
//! variables. Every tunable has a default; only the scheduling provider
//! endpoint and credentials must be present.
//!
//! ## Environment Variables
//! - `CAREGATE_REDIS_URL`: Redis connection URL
//! - `CAREGATE_CACHE_KEY_PREFIX`: prefix for every distributed cache key
//! - `CAREGATE_CACHE_CONNECT_TIMEOUT_SECS`: Redis connect timeout
//! - `CAREGATE_CACHE_RESPONSE_TIMEOUT_SECS`: Redis per-command timeout
//! - `CAREGATE_MEMORY_SWEEP_INTERVAL_SECS`: in-process cache purge interval
//! - `CAREGATE_PROVIDER_TOKEN_URL`: OAuth2 token endpoint (required)
//! - `CAREGATE_PROVIDER_CLIENT_ID`: OAuth2 client id (required)
//! - `CAREGATE_PROVIDER_CLIENT_SECRET`: OAuth2 client secret
//! - `CAREGATE_PROVIDER_USERNAME`: password-grant username (required)
//! - `CAREGATE_PROVIDER_PASSWORD`: password-grant password (required)
//! - `CAREGATE_PROVIDER_ACCESS_MARGIN_SECS`: refresh-early margin
//! - `CAREGATE_PROVIDER_REFRESH_TTL_SECS`: assumed refresh token lifetime
//! - `CAREGATE_PROVIDER_HTTP_TIMEOUT_SECS`: provider HTTP timeout
//! - `CAREGATE_RATE_LIMIT_MAX_REQUESTS`: requests per identity per window
//! - `CAREGATE_RATE_LIMIT_WINDOW_SECS`: rate limit window length
//! - `CAREGATE_QUEUE_MAX_ATTEMPTS`: notification delivery attempt budget
//! - `CAREGATE_QUEUE_ITEM_TTL_SECS`: absolute notification lifetime
//! - `CAREGATE_QUEUE_SWEEP_INTERVAL_SECS`: queue worker sweep interval
//! - `CAREGATE_SERVER_HOST` / `CAREGATE_SERVER_PORT`: HTTP bind address

use std::fmt::Display;
use std::str::FromStr;

use caregate_domain::{
    CacheSettings, CareGateError, ProviderSettings, QueueSettings, RateLimitSettings, Result,
    ServerSettings, Settings,
};

/// Load and validate configuration from the environment.
///
/// # Errors
/// Returns `CareGateError::Config` if a required variable is missing, a
/// value fails to parse, or the assembled settings fail validation.
pub fn load() -> Result<Settings> {
    let cache_defaults = CacheSettings::default();
    let cache = CacheSettings {
        redis_url: env_or("CAREGATE_REDIS_URL", &cache_defaults.redis_url),
        key_prefix: env_or("CAREGATE_CACHE_KEY_PREFIX", &cache_defaults.key_prefix),
        connect_timeout_secs: env_parse(
            "CAREGATE_CACHE_CONNECT_TIMEOUT_SECS",
            cache_defaults.connect_timeout_secs,
        )?,
        response_timeout_secs: env_parse(
            "CAREGATE_CACHE_RESPONSE_TIMEOUT_SECS",
            cache_defaults.response_timeout_secs,
        )?,
        memory_sweep_interval_secs: env_parse(
            "CAREGATE_MEMORY_SWEEP_INTERVAL_SECS",
            cache_defaults.memory_sweep_interval_secs,
        )?,
    };

    let provider = ProviderSettings {
        token_url: env_var("CAREGATE_PROVIDER_TOKEN_URL")?,
        client_id: env_var("CAREGATE_PROVIDER_CLIENT_ID")?,
        client_secret: env_or("CAREGATE_PROVIDER_CLIENT_SECRET", ""),
        username: env_var("CAREGATE_PROVIDER_USERNAME")?,
        password: env_var("CAREGATE_PROVIDER_PASSWORD")?,
        access_margin_secs: env_parse(
            "CAREGATE_PROVIDER_ACCESS_MARGIN_SECS",
            caregate_domain::constants::ACCESS_TOKEN_MARGIN_SECS,
        )?,
        refresh_ttl_secs: env_parse(
            "CAREGATE_PROVIDER_REFRESH_TTL_SECS",
            caregate_domain::constants::REFRESH_TOKEN_FALLBACK_SECS,
        )?,
        http_timeout_secs: env_parse(
            "CAREGATE_PROVIDER_HTTP_TIMEOUT_SECS",
            caregate_domain::constants::HTTP_TIMEOUT_SECS,
        )?,
    };

    let rate_defaults = RateLimitSettings::default();
    let rate_limit = RateLimitSettings {
        max_requests: env_parse("CAREGATE_RATE_LIMIT_MAX_REQUESTS", rate_defaults.max_requests)?,
        window_secs: env_parse("CAREGATE_RATE_LIMIT_WINDOW_SECS", rate_defaults.window_secs)?,
    };

    let queue_defaults = QueueSettings::default();
    let queue = QueueSettings {
        max_attempts: env_parse("CAREGATE_QUEUE_MAX_ATTEMPTS", queue_defaults.max_attempts)?,
        item_ttl_secs: env_parse("CAREGATE_QUEUE_ITEM_TTL_SECS", queue_defaults.item_ttl_secs)?,
        sweep_interval_secs: env_parse(
            "CAREGATE_QUEUE_SWEEP_INTERVAL_SECS",
            queue_defaults.sweep_interval_secs,
        )?,
    };

    let server_defaults = ServerSettings::default();
    let server = ServerSettings {
        host: env_or("CAREGATE_SERVER_HOST", &server_defaults.host),
        port: env_parse("CAREGATE_SERVER_PORT", server_defaults.port)?,
    };

    let settings = Settings { cache, provider, rate_limit, queue, server };
    settings.validate()?;

    tracing::info!("Configuration loaded from environment variables");
    Ok(settings)
}

/// Get required environment variable
///
/// # Errors
/// Returns `CareGateError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| CareGateError::Config(format!("Missing required environment variable: {key}")))
}

/// Get environment variable with a fallback value
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse environment variable into `T`, falling back when unset
///
/// # Errors
/// Returns `CareGateError::Config` if the variable is set but fails to
/// parse.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| CareGateError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}
