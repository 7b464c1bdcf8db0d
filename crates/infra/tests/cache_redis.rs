//! Integration tests for cache backend selection
//!
//! **Purpose**: Exercise the startup probe plus the Redis backend against
//! the shared store contract
//!
//! **Coverage:**
//! - Live Redis satisfies the full `CacheStore` contract (opt-in)
//! - Unreachable Redis falls back to the in-process backend, fail-open
//!
//! **Infrastructure:**
//! - A real Redis reachable via `CAREGATE_TEST_REDIS_URL` for the ignored
//!   contract test (`cargo test -- --ignored` with a server running)

use std::sync::Arc;

use caregate_common::testing::run_cache_contract_suite;
use caregate_domain::CacheSettings;
use caregate_infra::cache::{connect_cache, CacheBackend, RedisCache};

fn live_settings() -> CacheSettings {
    let redis_url = std::env::var("CAREGATE_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    CacheSettings { redis_url, key_prefix: "caregate-test:".to_string(), ..CacheSettings::default() }
}

/// Validates the Redis backend against the same contract suite the
/// in-process store passes. Needs a live server, so ignored by default.
#[tokio::test]
#[ignore = "requires a running Redis (set CAREGATE_TEST_REDIS_URL)"]
async fn live_redis_satisfies_the_cache_contract() {
    let cache = RedisCache::connect(&live_settings())
        .await
        .expect("Redis should be reachable for the live contract test");

    run_cache_contract_suite(Arc::new(cache)).await;
}

/// Validates the fail-open startup probe: a dead Redis yields a working
/// in-process store with its sweeper attached, never an error.
#[tokio::test]
async fn unreachable_redis_falls_back_to_the_memory_backend() {
    let settings = CacheSettings {
        redis_url: "redis://127.0.0.1:1".to_string(),
        connect_timeout_secs: 1,
        response_timeout_secs: 1,
        ..CacheSettings::default()
    };

    let connected = connect_cache(&settings).await;

    assert_eq!(connected.backend, CacheBackend::Memory);
    assert_eq!(connected.backend.as_str(), "memory");
    assert!(connected.sweeper.is_some(), "the memory backend needs its sweeper");

    connected
        .store
        .set("fallback-probe", "ok", None)
        .await
        .expect("the fallback store should accept writes");
    assert_eq!(
        connected.store.get("fallback-probe").await.expect("read should succeed").as_deref(),
        Some("ok")
    );
}
