//! Process-local [`SharedStateStore`].
//!
//! Mirrors the Redis semantics the limiters depend on (lazy absence, key and
//! hash-field TTLs, expiry modes, type errors) so the algorithms can be run
//! and tested without a server. State is only shared between limiters in the
//! same process.

use crate::clock::{Clock, SystemClock};
use crate::error::{LimiterError, LimiterResult};
use crate::store::{ExpiryMode, SharedStateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Operations between full sweeps of expired keys.
const SWEEP_INTERVAL: u64 = 256;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Option<Duration>,
}

impl<T> Expiring<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Duration) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }

    fn remaining(&self, now: Duration) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_sub(now))
    }

    /// Returns whether the TTL was applied.
    fn apply_ttl(&mut self, now: Duration, ttl: Duration, mode: ExpiryMode) -> bool {
        if mode.permits(self.remaining(now), ttl) {
            // Past the end of representable time the entry never expires.
            self.expires_at = now.checked_add(ttl);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Hash(HashMap<String, Expiring<String>>),
}

#[derive(Debug, Default)]
struct Entries {
    keys: HashMap<String, Expiring<Value>>,
    ops_since_sweep: u64,
}

impl Entries {
    /// Counts an operation and sweeps every [`SWEEP_INTERVAL`] of them, so
    /// keys that are never touched again are still reclaimed.
    fn tick(&mut self, now: Duration) {
        self.ops_since_sweep += 1;
        if self.ops_since_sweep >= SWEEP_INTERVAL {
            self.sweep(now);
        }
    }

    /// Drops every expired key and hash field. Returns the number of keys
    /// removed.
    fn sweep(&mut self, now: Duration) -> usize {
        let before = self.keys.len();
        self.keys.retain(|_, entry| {
            if !entry.is_live(now) {
                return false;
            }
            match &mut entry.value {
                Value::Hash(fields) => {
                    fields.retain(|_, field| field.is_live(now));
                    !fields.is_empty()
                }
                Value::Scalar(_) => true,
            }
        });
        self.ops_since_sweep = 0;
        before - self.keys.len()
    }

    /// Drops `key` if it, or every field of its hash, has expired.
    fn purge(&mut self, key: &str, now: Duration) {
        let expired = match self.keys.get_mut(key) {
            Some(entry) if !entry.is_live(now) => true,
            Some(Expiring {
                value: Value::Hash(fields),
                ..
            }) => {
                fields.retain(|_, field| field.is_live(now));
                fields.is_empty()
            }
            _ => false,
        };

        if expired {
            self.keys.remove(key);
        }
    }

    fn scalar(&mut self, key: &str, now: Duration) -> LimiterResult<Option<&mut Expiring<Value>>> {
        self.purge(key, now);
        match self.keys.get_mut(key) {
            Some(entry) if matches!(entry.value, Value::Hash(_)) => {
                Err(LimiterError::StoreOperationFailed(WRONG_TYPE.to_string()))
            }
            entry => Ok(entry),
        }
    }

    fn hash(
        &mut self,
        key: &str,
        now: Duration,
    ) -> LimiterResult<Option<&mut HashMap<String, Expiring<String>>>> {
        self.purge(key, now);
        match self.keys.get_mut(key) {
            Some(Expiring {
                value: Value::Hash(fields),
                ..
            }) => Ok(Some(fields)),
            Some(_) => Err(LimiterError::StoreOperationFailed(WRONG_TYPE.to_string())),
            None => Ok(None),
        }
    }

    fn hash_or_insert(
        &mut self,
        key: &str,
        now: Duration,
    ) -> LimiterResult<&mut HashMap<String, Expiring<String>>> {
        if self.hash(key, now)?.is_none() {
            self.keys
                .insert(key.to_string(), Expiring::new(Value::Hash(HashMap::new())));
        }
        match self.keys.get_mut(key) {
            Some(Expiring {
                value: Value::Hash(fields),
                ..
            }) => Ok(fields),
            _ => Err(LimiterError::StoreOperationFailed(WRONG_TYPE.to_string())),
        }
    }
}

/// In-memory store guarded by a single async mutex, so each primitive is
/// atomic with respect to every other.
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<Entries>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(Entries::default()),
        }
    }

    async fn lock(&self) -> (Duration, MutexGuard<'_, Entries>) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.tick(now);
        (now, entries)
    }

    /// Removes every expired key now instead of waiting for the next sweep.
    /// Returns how many keys were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        self.entries.lock().await.sweep(now)
    }

    /// Remaining TTL of `key`, `None` if it has none or does not exist.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.purge(key, now);
        entries.keys.get(key).and_then(|entry| entry.remaining(now))
    }

    /// Remaining TTL of a hash field, `None` if it has none or does not exist.
    pub async fn field_ttl(&self, key: &str, field: &str) -> Option<Duration> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.hash(key, now) {
            Ok(Some(fields)) => fields.get(field).and_then(|f| f.remaining(now)),
            _ => None,
        }
    }

    /// Number of keys currently held, expired ones excluded.
    pub async fn key_count(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.sweep(now);
        entries.keys.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_integer(raw: &str) -> LimiterResult<i64> {
    raw.parse::<i64>().map_err(|_| {
        LimiterError::StoreOperationFailed("ERR value is not an integer or out of range".into())
    })
}

#[async_trait]
impl SharedStateStore for InMemoryStore {
    async fn get(&self, key: &str) -> LimiterResult<Option<String>> {
        let (now, mut entries) = self.lock().await;
        Ok(entries.scalar(key, now)?.and_then(|entry| match &entry.value {
            Value::Scalar(raw) => Some(raw.clone()),
            Value::Hash(_) => None,
        }))
    }

    async fn set(&self, key: &str, value: &str) -> LimiterResult<()> {
        let (_, mut entries) = self.lock().await;
        entries
            .keys
            .insert(key.to_string(), Expiring::new(Value::Scalar(value.to_string())));
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>> {
        let (now, mut entries) = self.lock().await;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            entries.purge(key, now);
            // MGET reports non-string keys as missing instead of failing.
            values.push(match entries.keys.get(*key) {
                Some(Expiring {
                    value: Value::Scalar(raw),
                    ..
                }) => Some(raw.clone()),
                _ => None,
            });
        }
        Ok(values)
    }

    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()> {
        let (now, mut entries) = self.lock().await;
        for (key, value) in pairs {
            entries.keys.insert(
                key.to_string(),
                Expiring {
                    value: Value::Scalar(value.clone()),
                    expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
                },
            );
        }
        Ok(())
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        let (now, mut entries) = self.lock().await;

        let next = match entries.scalar(key, now)? {
            Some(Expiring {
                value: Value::Scalar(raw),
                ..
            }) => parse_integer(raw)? + 1,
            _ => 1,
        };

        let entry = entries
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(Value::Scalar(String::new())));
        entry.value = Value::Scalar(next.to_string());
        entry.apply_ttl(now, ttl, mode);

        Ok(next)
    }

    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>> {
        let (now, mut entries) = self.lock().await;
        Ok(entries
            .hash(key, now)?
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hash_incr_with_expiry(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        let (now, mut entries) = self.lock().await;
        let fields = entries.hash_or_insert(key, now)?;

        let next = match fields.get(field) {
            Some(existing) => parse_integer(&existing.value)? + delta,
            None => delta,
        };

        let entry = fields
            .entry(field.to_string())
            .or_insert_with(|| Expiring::new(String::new()));
        entry.value = next.to_string();
        entry.apply_ttl(now, ttl, mode);

        Ok(next)
    }

    async fn hash_len(&self, key: &str) -> LimiterResult<u64> {
        let (now, mut entries) = self.lock().await;
        Ok(entries
            .hash(key, now)?
            .map_or(0, |fields| fields.len() as u64))
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool> {
        let (now, mut entries) = self.lock().await;
        let fields = entries.hash_or_insert(key, now)?;

        let created = !fields.contains_key(field);
        let entry = fields
            .entry(field.to_string())
            .or_insert_with(|| Expiring::new(String::new()));
        entry.value = value.to_string();
        entry.apply_ttl(now, ttl, mode);

        Ok(created)
    }
}
