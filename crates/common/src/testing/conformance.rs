//! Cache contract conformance suite
//!
//! One battery of checks that every [`CacheStore`] backend must pass. The
//! in-process store runs it from its unit tests and the Redis backend runs
//! it from the integration tests, which keeps the two implementations honest
//! about the shared contract.
//!
//! The checks are deliberately time-free: nothing here sleeps or advances a
//! clock, so the suite behaves identically against a mocked store and a live
//! server. Clock-driven behavior (lazy expiry, TTL countdown) is covered by
//! backend-specific tests instead.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use caregate_common::cache::MemoryCache;
//! use caregate_common::testing::run_cache_contract_suite;
//!
//! # async fn demo() {
//! run_cache_contract_suite(Arc::new(MemoryCache::new())).await;
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheError, CacheStore, KeyTtl};
use crate::resilience::{Clock, SystemClock};

/// Run the full contract suite against a backend.
///
/// Keys are namespaced with a per-run nonce so repeated runs against a
/// persistent backend never see each other's leftovers, and every check
/// deletes its keys when it finishes.
///
/// # Panics
///
/// Panics on the first contract violation so test failures surface at the
/// exact check that broke.
pub async fn run_cache_contract_suite(store: Arc<dyn CacheStore>) {
    let ns = format!("conformance:{}:", SystemClock.millis_since_epoch());

    roundtrip_and_delete(store.as_ref(), &ns).await;
    set_replaces_value_and_ttl(store.as_ref(), &ns).await;
    set_if_absent_contract(store.as_ref(), &ns).await;
    concurrent_claims_have_one_winner(Arc::clone(&store), &ns).await;
    increment_contract(store.as_ref(), &ns).await;
    expire_and_ttl_contract(store.as_ref(), &ns).await;
}

async fn roundtrip_and_delete(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}roundtrip");

    let missing = store.get(&key).await.expect("get on a missing key must succeed");
    assert_eq!(missing, None, "missing key must read as None");

    store
        .set(&key, "v1", Some(Duration::from_secs(60)))
        .await
        .expect("set must succeed");
    let value = store.get(&key).await.expect("get must succeed");
    assert_eq!(value.as_deref(), Some("v1"), "set value must read back verbatim");

    store.delete(&key).await.expect("delete must succeed");
    assert_eq!(store.get(&key).await.expect("get must succeed"), None, "deleted key must be gone");

    // Deleting an already-absent key is a no-op, not an error.
    store.delete(&key).await.expect("delete on a missing key must succeed");
}

async fn set_replaces_value_and_ttl(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}overwrite");

    store
        .set(&key, "short-lived", Some(Duration::from_secs(60)))
        .await
        .expect("set must succeed");
    store.set(&key, "persistent", None).await.expect("overwrite must succeed");

    let value = store.get(&key).await.expect("get must succeed");
    assert_eq!(value.as_deref(), Some("persistent"), "overwrite must replace the value");
    assert_eq!(
        store.ttl(&key).await.expect("ttl must succeed"),
        KeyTtl::NoExpiry,
        "overwrite must replace the TTL, not merge with it"
    );

    store.delete(&key).await.expect("cleanup delete must succeed");
}

async fn set_if_absent_contract(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}claim");

    let won = store
        .set_if_absent(&key, "first", Some(Duration::from_secs(60)))
        .await
        .expect("claim must succeed");
    assert!(won, "claim on a missing key must win");

    let lost = store
        .set_if_absent(&key, "second", Some(Duration::from_secs(600)))
        .await
        .expect("claim must succeed");
    assert!(!lost, "claim on a held key must be rejected");

    let value = store.get(&key).await.expect("get must succeed");
    assert_eq!(value.as_deref(), Some("first"), "rejected claim must leave the value untouched");
    match store.ttl(&key).await.expect("ttl must succeed") {
        KeyTtl::Remaining(left) => assert!(
            left <= Duration::from_secs(60),
            "rejected claim must leave the holder's TTL untouched, saw {left:?}"
        ),
        other => panic!("expected a finite TTL on the held key, got {other:?}"),
    }

    store.delete(&key).await.expect("delete must succeed");
    let reclaimed =
        store.set_if_absent(&key, "third", None).await.expect("claim must succeed");
    assert!(reclaimed, "claim must win again once the key is gone");
    assert_eq!(
        store.ttl(&key).await.expect("ttl must succeed"),
        KeyTtl::NoExpiry,
        "claim without a TTL must store a non-expiring key"
    );

    store.delete(&key).await.expect("cleanup delete must succeed");
}

async fn concurrent_claims_have_one_winner(store: Arc<dyn CacheStore>, ns: &str) {
    let key = format!("{ns}race");

    let mut handles = Vec::new();
    for worker in 0..16 {
        let store = Arc::clone(&store);
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store
                .set_if_absent(&key, &format!("owner-{worker}"), Some(Duration::from_secs(60)))
                .await
                .expect("concurrent claim must not error")
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.expect("claim task must not panic") {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent claim may win");

    store.delete(&key).await.expect("cleanup delete must succeed");
}

async fn increment_contract(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}counter");

    let first = store.increment(&key).await.expect("increment must succeed");
    assert_eq!(first, 1, "increment on a missing key must create it at 1");
    let second = store.increment(&key).await.expect("increment must succeed");
    assert_eq!(second, 2, "increment must step by one");
    assert_eq!(
        store.ttl(&key).await.expect("ttl must succeed"),
        KeyTtl::NoExpiry,
        "a counter created by increment has no expiry until one is armed"
    );

    let armed =
        store.expire(&key, Duration::from_secs(600)).await.expect("expire must succeed");
    assert!(armed, "expire on a live counter must report true");
    let third = store.increment(&key).await.expect("increment must succeed");
    assert_eq!(third, 3, "increment must keep counting after a TTL is armed");
    match store.ttl(&key).await.expect("ttl must succeed") {
        KeyTtl::Remaining(left) => assert!(
            left > Duration::ZERO && left <= Duration::from_secs(600),
            "increment must leave the armed TTL running, saw {left:?}"
        ),
        other => panic!("expected a finite TTL after arming one, got {other:?}"),
    }

    store.set(&key, "not a number", None).await.expect("set must succeed");
    let err = store
        .increment(&key)
        .await
        .expect_err("incrementing a non-integer value must fail");
    assert!(
        matches!(err, CacheError::InvalidValue(_)),
        "non-integer increment must surface as InvalidValue, got {err:?}"
    );

    store.delete(&key).await.expect("cleanup delete must succeed");
}

async fn expire_and_ttl_contract(store: &dyn CacheStore, ns: &str) {
    let key = format!("{ns}expiry");

    let armed =
        store.expire(&key, Duration::from_secs(30)).await.expect("expire must succeed");
    assert!(!armed, "expire on a missing key must report false");
    assert_eq!(
        store.ttl(&key).await.expect("ttl must succeed"),
        KeyTtl::Missing,
        "ttl on a missing key must report Missing"
    );

    store.set(&key, "v", None).await.expect("set must succeed");
    assert_eq!(
        store.ttl(&key).await.expect("ttl must succeed"),
        KeyTtl::NoExpiry,
        "ttl on a key without expiry must report NoExpiry"
    );

    let armed =
        store.expire(&key, Duration::from_secs(30)).await.expect("expire must succeed");
    assert!(armed, "expire on a live key must report true");
    match store.ttl(&key).await.expect("ttl must succeed") {
        KeyTtl::Remaining(left) => assert!(
            left > Duration::ZERO && left <= Duration::from_secs(30),
            "armed TTL must count down from the requested duration, saw {left:?}"
        ),
        other => panic!("expected a finite TTL after expire, got {other:?}"),
    }

    store.delete(&key).await.expect("cleanup delete must succeed");
}
