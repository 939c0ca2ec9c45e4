//! Runs against a live Redis (7.4+ for hash-field TTLs) when `REDIS_URL` is
//! set, and is a no-op otherwise.

mod common;

use common::init_tracing;
use quotakeeper::{
    ExpiryMode, FixedWindowCounter, KeyGenerator, RateLimiter, RedisStore, SharedStateStore,
    SlidingWindowCounter, SlidingWindowLog, TokenBucket,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn connect() -> Option<Arc<RedisStore>> {
    let url = env::var("REDIS_URL").ok()?;
    init_tracing();
    Some(Arc::new(RedisStore::connect(&url).await.unwrap()))
}

fn unique_keys() -> KeyGenerator {
    KeyGenerator::new(format!("quotakeeper_test_{}", Uuid::new_v4().simple()))
}

#[tokio::test]
async fn test_redis_primitives() {
    let Some(store) = connect().await else {
        return;
    };
    let keys = unique_keys();
    let key = keys.client_key("primitives");
    let window = Duration::from_secs(30);

    assert_eq!(store.ping().await.unwrap(), "PONG");
    assert_eq!(store.get(&key).await.unwrap(), None);

    assert_eq!(store.incr_with_expiry(&key, window, ExpiryMode::Nx).await.unwrap(), 1);
    assert_eq!(store.incr_with_expiry(&key, window, ExpiryMode::Nx).await.unwrap(), 2);
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("2"));

    store.set(&key, "not-a-number").await.unwrap();
    assert!(store.incr_with_expiry(&key, window, ExpiryMode::Nx).await.is_err());

    let hash = keys.client_key("hash");
    assert_eq!(
        store.hash_incr_with_expiry(&hash, "1", 1, window, ExpiryMode::Nx).await.unwrap(),
        1
    );
    assert!(store.hash_set_with_expiry(&hash, "2", "x", window, ExpiryMode::Nx).await.unwrap());
    assert_eq!(store.hash_len(&hash).await.unwrap(), 2);
    assert_eq!(store.hash_get_all(&hash).await.unwrap()["1"], "1");

    let a = keys.token_count_key("pair");
    let b = keys.last_refill_key("pair");
    store
        .set_many_with_expiry(
            &[(a.as_str(), "3".to_string()), (b.as_str(), "42".to_string())],
            Some(window),
        )
        .await
        .unwrap();
    assert_eq!(
        store.get_many(&[a.as_str(), b.as_str()]).await.unwrap(),
        vec![Some("3".to_string()), Some("42".to_string())]
    );
}

#[tokio::test]
async fn test_redis_limiters_enforce_limits() {
    let Some(store) = connect().await else {
        return;
    };

    let limiters: Vec<Box<dyn RateLimiter>> = vec![
        Box::new(
            FixedWindowCounter::new(store.clone(), Duration::from_secs(30), 3)
                .with_key_generator(unique_keys()),
        ),
        Box::new(
            SlidingWindowCounter::new(store.clone(), 3, Duration::from_secs(30))
                .with_key_generator(unique_keys()),
        ),
        Box::new(
            SlidingWindowLog::new(store.clone(), 3, Duration::from_secs(30))
                .with_key_generator(unique_keys()),
        ),
        Box::new(TokenBucket::new(store.clone(), 3, 0.01).with_key_generator(unique_keys())),
    ];

    for limiter in &limiters {
        for _ in 0..3 {
            assert!(limiter.decide("client").await, "{}", limiter.algorithm());
        }
        assert!(!limiter.decide("client").await, "{}", limiter.algorithm());
    }
}

#[tokio::test]
async fn test_redis_fixed_window_expires() {
    let Some(store) = connect().await else {
        return;
    };
    let limiter = FixedWindowCounter::new(store, Duration::from_secs(1), 1)
        .with_key_generator(unique_keys());

    assert!(limiter.decide("client").await);
    assert!(!limiter.decide("client").await);
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(limiter.decide("client").await);
}

#[tokio::test]
async fn test_unreachable_redis_is_unavailable() {
    init_tracing();
    // Nothing listens on port 1.
    let result = RedisStore::connect("redis://127.0.0.1:1").await;
    assert!(result.is_err());
}
