//! Redis-backed implementation of the cache contract
//!
//! One multiplexed connection is established at startup and cloned per
//! operation; the clone is a cheap handle onto the same socket. Connect and
//! response timeouts come from [`CacheSettings`] so a wedged server cannot
//! stall request handling.
//!
//! Every key is namespaced with the configured prefix before it reaches the
//! server, which keeps a shared Redis from colliding with other tenants.

use std::time::Duration;

use caregate_common::cache::{CacheError, CacheResult, CacheStore, KeyTtl};
use caregate_domain::CacheSettings;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, ErrorKind, ExistenceCheck, SetExpiry, SetOptions};

/// Distributed cache backend speaking the Redis protocol.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisCache {
    /// Connect to the server named in `settings`.
    ///
    /// The connection attempt doubles as the startup reachability probe: the
    /// factory falls back to the in-process store when this returns an error.
    ///
    /// # Errors
    /// `CacheError::Connection` when the URL is malformed or the server does
    /// not answer within the connect timeout.
    pub async fn connect(settings: &CacheSettings) -> CacheResult<Self> {
        let client = Client::open(settings.redis_url.as_str())
            .map_err(|e| CacheError::Connection(format!("invalid Redis URL: {e}")))?;

        let conn = client
            .get_multiplexed_async_connection_with_timeouts(
                Duration::from_secs(settings.response_timeout_secs),
                Duration::from_secs(settings.connect_timeout_secs),
            )
            .await
            .map_err(|e| CacheError::Connection(format!("Redis connect error: {e}")))?;

        Ok(Self { conn, key_prefix: settings.key_prefix.clone() })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> =
            conn.get(self.prefixed(key)).await.map_err(|e| map_redis_err("GET", e))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                // SETEX rejects a zero expiry; TTLs are stored at whole-second
                // resolution with a one-second floor.
                let secs = ttl.as_secs().max(1);
                let _: () = conn
                    .set_ex(self.prefixed(key), value, secs)
                    .await
                    .map_err(|e| map_redis_err("SETEX", e))?;
            }
            None => {
                let _: () = conn
                    .set(self.prefixed(key), value)
                    .await
                    .map_err(|e| map_redis_err("SET", e))?;
            }
        }
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        // SET NX EX is a single command on the server, so concurrent callers
        // race atomically and exactly one wins.
        let mut opts = SetOptions::default().conditional_set(ExistenceCheck::NX);
        if let Some(ttl) = ttl {
            opts = opts.with_expiration(SetExpiry::EX(ttl.as_secs().max(1)));
        }
        let outcome: Option<String> = conn
            .set_options(self.prefixed(key), value, opts)
            .await
            .map_err(|e| map_redis_err("SET NX", e))?;
        Ok(outcome.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.prefixed(key)).await.map_err(|e| map_redis_err("DEL", e))?;
        Ok(())
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        match conn.incr::<_, _, i64>(self.prefixed(key), 1i64).await {
            Ok(count) => Ok(count),
            Err(e) if is_non_integer_error(&e) => {
                Err(CacheError::InvalidValue(format!("Redis INCR error: {e}")))
            }
            Err(e) => Err(map_redis_err("INCR", e)),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let secs = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
        let armed: bool = conn
            .expire(self.prefixed(key), secs)
            .await
            .map_err(|e| map_redis_err("EXPIRE", e))?;
        Ok(armed)
    }

    async fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let raw: i64 =
            conn.ttl(self.prefixed(key)).await.map_err(|e| map_redis_err("TTL", e))?;
        // The server reports -2 for a missing key and -1 for a key without
        // an expiry.
        Ok(match raw {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::NoExpiry,
            secs => KeyTtl::Remaining(Duration::from_secs(secs.max(0) as u64)),
        })
    }
}

/// The server answers INCR on a non-integer value with a response error; the
/// contract wants that surfaced as `InvalidValue`, not a generic failure.
fn is_non_integer_error(err: &redis::RedisError) -> bool {
    err.kind() == ErrorKind::ResponseError && err.to_string().contains("not an integer")
}

fn map_redis_err(op: &str, err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_timeout() || err.is_connection_refusal() {
        CacheError::Connection(format!("Redis {op} error: {err}"))
    } else {
        CacheError::Command(format!("Redis {op} error: {err}"))
    }
}
