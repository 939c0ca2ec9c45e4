use crate::error::{LimiterError, LimiterResult};
use crate::store::{ExpiryMode, SharedStateStore, MAX_TTL};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline, RedisError};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// [`SharedStateStore`] backed by Redis.
///
/// Count mutations that carry a TTL are sent as one `MULTI`/`EXEC`
/// transaction so the increment and the expiry land together. Hash-field
/// TTLs use `HPEXPIRE`, which needs Redis 7.4 or newer.
///
/// Reconnects are left to [`ConnectionManager`]; this type never retries.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> LimiterResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            LimiterError::Configuration(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = client
            .get_connection_manager()
            .await
            .map_err(|e| command_error("CONNECT", e))?;

        info!(target: "quotakeeper::redis", "Connected to Redis");

        Ok(Self::from_connection_manager(connection_manager))
    }

    pub fn from_connection_manager(connection_manager: ConnectionManager) -> Self {
        Self { connection_manager }
    }

    pub async fn ping(&self) -> LimiterResult<String> {
        let mut conn = self.connection();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING", e))
    }

    fn connection(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }
}

#[async_trait]
impl SharedStateStore for RedisStore {
    async fn get(&self, key: &str) -> LimiterResult<Option<String>> {
        let mut conn = self.connection();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("GET", e))
    }

    async fn set(&self, key: &str, value: &str) -> LimiterResult<()> {
        let mut conn = self.connection();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| command_error("SET", e))
    }

    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.connection();
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("MGET", e))
    }

    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in pairs {
            pipe.cmd("SET").arg(*key).arg(value);
            if let Some(ttl) = ttl {
                pipe.arg("PX").arg(ttl_millis(ttl));
            }
            pipe.ignore();
        }

        let mut conn = self.connection();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| command_error("MULTI SET", e))
    }

    async fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("INCR").arg(key);
        pipe.cmd("PEXPIRE").arg(key).arg(ttl_millis(ttl));
        push_mode(&mut pipe, mode);

        let mut conn = self.connection();
        let (value, _applied): (i64, i64) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("MULTI INCR/PEXPIRE", e))?;

        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>> {
        let mut conn = self.connection();
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("HGETALL", e))
    }

    async fn hash_incr_with_expiry(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("HINCRBY").arg(key).arg(field).arg(delta);
        push_field_expiry(&mut pipe, key, field, ttl, mode);

        let mut conn = self.connection();
        let (value, _applied): (i64, Vec<i64>) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("MULTI HINCRBY/HPEXPIRE", e))?;

        Ok(value)
    }

    async fn hash_len(&self, key: &str) -> LimiterResult<u64> {
        let mut conn = self.connection();
        redis::cmd("HLEN")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("HLEN", e))
    }

    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("HSET").arg(key).arg(field).arg(value);
        push_field_expiry(&mut pipe, key, field, ttl, mode);

        let mut conn = self.connection();
        let (created, _applied): (i64, Vec<i64>) = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("MULTI HSET/HPEXPIRE", e))?;

        Ok(created > 0)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PEXPIRE 0 deletes the key outright.
    ttl.min(MAX_TTL).as_millis().max(1) as u64
}

fn push_mode(pipe: &mut Pipeline, mode: ExpiryMode) {
    if let Some(flag) = mode.as_arg() {
        pipe.arg(flag);
    }
}

fn push_field_expiry(pipe: &mut Pipeline, key: &str, field: &str, ttl: Duration, mode: ExpiryMode) {
    pipe.cmd("HPEXPIRE").arg(key).arg(ttl_millis(ttl));
    push_mode(pipe, mode);
    pipe.arg("FIELDS").arg(1).arg(field);
}

/// Prefixes the failing command while keeping the error classification.
fn command_error(command: &str, err: RedisError) -> LimiterError {
    match LimiterError::from(err) {
        LimiterError::StoreUnavailable(msg) => {
            LimiterError::StoreUnavailable(format!("{} failed: {}", command, msg))
        }
        LimiterError::StoreOperationFailed(msg) => {
            LimiterError::StoreOperationFailed(format!("{} failed: {}", command, msg))
        }
        other => other,
    }
}
