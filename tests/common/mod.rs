#![allow(dead_code)]

use async_trait::async_trait;
use quotakeeper::{ExpiryMode, InMemoryStore, LimiterError, LimiterResult, SharedStateStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use tokio::sync::Barrier;
use std::time::Duration;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "quotakeeper=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Store primitives that [`FaultyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Set,
    GetMany,
    SetMany,
    Incr,
    HashGetAll,
    HashIncr,
    HashLen,
    HashSet,
}

/// Wraps an [`InMemoryStore`] and fails chosen primitives before they touch
/// the inner store, so a failed call never mutates anything.
pub struct FaultyStore {
    inner: Arc<InMemoryStore>,
    failing: Mutex<HashSet<Op>>,
    calls: Mutex<Vec<Op>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Op> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, op: Op) -> LimiterResult<()> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            Err(LimiterError::StoreUnavailable(format!(
                "{:?} failed: connection refused",
                op
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SharedStateStore for FaultyStore {
    async fn get(&self, key: &str) -> LimiterResult<Option<String>> {
        self.check(Op::Get)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> LimiterResult<()> {
        self.check(Op::Set)?;
        self.inner.set(key, value).await
    }

    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>> {
        self.check(Op::GetMany)?;
        self.inner.get_many(keys).await
    }

    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()> {
        self.check(Op::SetMany)?;
        self.inner.set_many_with_expiry(pairs, ttl).await
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        self.check(Op::Incr)?;
        self.inner.incr_with_expiry(key, ttl, mode).await
    }

    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>> {
        self.check(Op::HashGetAll)?;
        self.inner.hash_get_all(key).await
    }

    async fn hash_incr_with_expiry(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        self.check(Op::HashIncr)?;
        self.inner
            .hash_incr_with_expiry(key, field, delta, ttl, mode)
            .await
    }

    async fn hash_len(&self, key: &str) -> LimiterResult<u64> {
        self.check(Op::HashLen)?;
        self.inner.hash_len(key).await
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool> {
        self.check(Op::HashSet)?;
        self.inner
            .hash_set_with_expiry(key, field, value, ttl, mode)
            .await
    }
}

/// Store whose increments always report the no-op sentinel `0`.
pub struct NoOpIncrementStore {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl SharedStateStore for NoOpIncrementStore {
    async fn get(&self, key: &str) -> LimiterResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> LimiterResult<()> {
        self.inner.set(key, value).await
    }

    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>> {
        self.inner.get_many(keys).await
    }

    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()> {
        self.inner.set_many_with_expiry(pairs, ttl).await
    }

    async fn incr_with_expiry(
        &self,
        _key: &str,
        _ttl: Duration,
        _mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        Ok(0)
    }

    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_incr_with_expiry(
        &self,
        _key: &str,
        _field: &str,
        _delta: i64,
        _ttl: Duration,
        _mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        Ok(0)
    }

    async fn hash_len(&self, key: &str) -> LimiterResult<u64> {
        self.inner.hash_len(key).await
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool> {
        self.inner
            .hash_set_with_expiry(key, field, value, ttl, mode)
            .await
    }
}

/// Holds every reader of a scalar at a barrier after its `GET`, so a group
/// of concurrent callers all observe the count before any of them commits.
pub struct GatedStore {
    pub inner: Arc<InMemoryStore>,
    gate: Barrier,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryStore>, callers: usize) -> Self {
        Self {
            inner,
            gate: Barrier::new(callers),
        }
    }
}

#[async_trait]
impl SharedStateStore for GatedStore {
    async fn get(&self, key: &str) -> LimiterResult<Option<String>> {
        let value = self.inner.get(key).await;
        self.gate.wait().await;
        value
    }

    async fn set(&self, key: &str, value: &str) -> LimiterResult<()> {
        self.inner.set(key, value).await
    }

    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>> {
        self.inner.get_many(keys).await
    }

    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()> {
        self.inner.set_many_with_expiry(pairs, ttl).await
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        self.inner.incr_with_expiry(key, ttl, mode).await
    }

    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_incr_with_expiry(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        self.inner
            .hash_incr_with_expiry(key, field, delta, ttl, mode)
            .await
    }

    async fn hash_len(&self, key: &str) -> LimiterResult<u64> {
        self.inner.hash_len(key).await
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool> {
        self.inner
            .hash_set_with_expiry(key, field, value, ttl, mode)
            .await
    }
}
