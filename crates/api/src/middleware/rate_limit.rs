//! Fixed-window rate limiting over the shared cache
//!
//! One counter per caller per window, kept in the same cache as everything
//! else so all instances enforce one budget when Redis is up. The caller
//! identity is a truncated SHA-256 of the client IP; raw addresses never
//! become cache keys.
//!
//! The window is checked twice. The pre-check rejects saturated windows
//! without growing the counter, so a hammering client cannot keep its own
//! window alive. The post-increment check catches concurrent requests that
//! raced past the pre-check together.
//!
//! A broken cache admits requests instead of refusing them; throttling is
//! protection, not a guarantee anyone depends on.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use caregate_common::cache::{CacheResult, CacheStore, KeyTtl};
use caregate_domain::constants::{RATE_LIMIT_IDENTITY_LEN, RATE_LIMIT_PREFIX};
use caregate_domain::CareGateError;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::context::AppContext;
use crate::error::ApiError;

const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// What the window said about this request.
enum Verdict {
    Allowed { remaining: u32, reset_secs: u64 },
    Rejected { retry_after_secs: u64 },
}

/// Per-request throttle. Mounted with `middleware::from_fn_with_state`.
pub async fn rate_limit_middleware(
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let limit = ctx.rate_limit.max_requests;
    let window = Duration::from_secs(ctx.rate_limit.window_secs);
    let key = identity_key(client_ip(&request, addr));

    match evaluate(ctx.store.as_ref(), &key, limit, window).await {
        Ok(Verdict::Allowed { remaining, reset_secs }) => {
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), limit, remaining, reset_secs);
            response
        }
        Ok(Verdict::Rejected { retry_after_secs }) => {
            let mut response =
                ApiError(CareGateError::RateLimited { retry_after_secs }).into_response();
            apply_headers(response.headers_mut(), limit, 0, retry_after_secs);
            response
        }
        Err(e) => {
            // Fail open: no quota headers either, their numbers would be
            // fiction.
            warn!(error = %e, "rate limiter cache unavailable, admitting request");
            next.run(request).await
        }
    }
}

/// Run one request through the window counter.
async fn evaluate(
    store: &dyn CacheStore,
    key: &str,
    limit: u32,
    window: Duration,
) -> CacheResult<Verdict> {
    // Pre-check: a saturated window is rejected without touching the
    // counter, so rejected traffic cannot extend its own window.
    if let Some(raw) = store.get(key).await? {
        if let Ok(count) = raw.parse::<i64>() {
            if count >= i64::from(limit) {
                let retry_after_secs = window_ttl(store, key, window).await;
                return Ok(Verdict::Rejected { retry_after_secs });
            }
        }
    }

    let count = store.increment(key).await?;
    if count == 1 {
        // The first request of a window owns attaching the TTL; increment
        // itself never sets one.
        store.expire(key, window).await?;
    }

    // Post-check: concurrent requests may have raced past the pre-check
    // together, overshooting the limit between read and increment.
    if count > i64::from(limit) {
        let retry_after_secs = window_ttl(store, key, window).await;
        return Ok(Verdict::Rejected { retry_after_secs });
    }

    let reset_secs = if count == 1 {
        window.as_secs()
    } else {
        window_ttl(store, key, window).await
    };
    let used = u32::try_from(count).unwrap_or(u32::MAX);
    Ok(Verdict::Allowed { remaining: limit.saturating_sub(used), reset_secs })
}

/// Seconds until the current window resets, clamped to at least one.
///
/// A counter found without a TTL lost its window to a failed `expire`
/// right after creation; re-arm it here so the window can still reset
/// instead of rejecting that caller until a restart.
async fn window_ttl(store: &dyn CacheStore, key: &str, window: Duration) -> u64 {
    match store.ttl(key).await {
        Ok(KeyTtl::Remaining(left)) => left.as_secs().max(1),
        Ok(KeyTtl::NoExpiry) => {
            if let Err(e) = store.expire(key, window).await {
                warn!(error = %e, "failed to re-arm a rate-limit window");
            }
            window.as_secs()
        }
        Ok(KeyTtl::Missing) | Err(_) => window.as_secs(),
    }
}

/// Cache key for one caller: prefixed, hashed, truncated.
fn identity_key(ip: IpAddr) -> String {
    let digest = Sha256::digest(ip.to_string().as_bytes());
    let hash = hex::encode(digest);
    format!("{RATE_LIMIT_PREFIX}{}", &hash[..RATE_LIMIT_IDENTITY_LEN])
}

/// Client IP, honouring the first hop of `X-Forwarded-For` when a proxy
/// put one there.
fn client_ip(request: &Request, fallback: SocketAddr) -> IpAddr {
    if let Some(forwarded) =
        request.headers().get("x-forwarded-for").and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse() {
                return ip;
            }
        }
    }
    fallback.ip()
}

fn apply_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_secs: u64) {
    insert_numeric(headers, LIMIT_HEADER, u64::from(limit));
    insert_numeric(headers, REMAINING_HEADER, u64::from(remaining));
    insert_numeric(headers, RESET_HEADER, reset_secs);
}

fn insert_numeric(headers: &mut HeaderMap, name: HeaderName, value: u64) {
    headers.insert(
        name,
        HeaderValue::from_str(&value.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
}
