//! Contract for the store that holds limiter state shared between processes.

use crate::error::LimiterResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Longest TTL a store will honour. Redis keeps millisecond expiries in a
/// signed 64-bit integer; anything longer is stored without a TTL.
pub const MAX_TTL: Duration = Duration::from_millis(i64::MAX as u64);

/// Condition under which a TTL update is applied.
///
/// For [`ExpiryMode::Gt`] and [`ExpiryMode::Lt`] a key or field without a
/// TTL is treated as having an infinite one, the same way Redis does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpiryMode {
    /// Always set the TTL.
    #[default]
    Default,
    /// Only if there is no TTL yet.
    Nx,
    /// Only if a TTL already exists.
    Xx,
    /// Only if the new TTL is greater than the current one.
    Gt,
    /// Only if the new TTL is less than the current one.
    Lt,
}

impl ExpiryMode {
    /// Flag appended to `EXPIRE`/`HEXPIRE`, `None` for [`ExpiryMode::Default`].
    pub fn as_arg(&self) -> Option<&'static str> {
        match self {
            ExpiryMode::Default => None,
            ExpiryMode::Nx => Some("NX"),
            ExpiryMode::Xx => Some("XX"),
            ExpiryMode::Gt => Some("GT"),
            ExpiryMode::Lt => Some("LT"),
        }
    }

    /// Whether a TTL of `new_ttl` may replace `current` under this mode.
    pub fn permits(&self, current: Option<Duration>, new_ttl: Duration) -> bool {
        match (self, current) {
            (ExpiryMode::Default, _) => true,
            (ExpiryMode::Nx, current) => current.is_none(),
            (ExpiryMode::Xx, current) => current.is_some(),
            (ExpiryMode::Gt, None) => false,
            (ExpiryMode::Gt, Some(current)) => new_ttl > current,
            (ExpiryMode::Lt, None) => true,
            (ExpiryMode::Lt, Some(current)) => new_ttl < current,
        }
    }
}

impl fmt::Display for ExpiryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg().unwrap_or(""))
    }
}

/// Key/value and hash primitives the limiters rely on.
///
/// Every method that combines a count mutation with a TTL update must run
/// as one atomic store operation. Errors are surfaced as they happen, never
/// folded into a zero value.
#[async_trait]
pub trait SharedStateStore: Send + Sync {
    /// `None` when the key does not exist.
    async fn get(&self, key: &str) -> LimiterResult<Option<String>>;

    /// Sets a value without a TTL, clearing any existing one.
    async fn set(&self, key: &str, value: &str) -> LimiterResult<()>;

    /// Reads several scalars in a single atomic round trip.
    async fn get_many(&self, keys: &[&str]) -> LimiterResult<Vec<Option<String>>>;

    /// Writes several scalars atomically, each with `ttl` when given.
    async fn set_many_with_expiry(
        &self,
        pairs: &[(&str, String)],
        ttl: Option<Duration>,
    ) -> LimiterResult<()>;

    /// Increments `key` by one and applies `ttl` under `mode`.
    /// Returns the value after the increment.
    async fn incr_with_expiry(
        &self,
        key: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64>;

    /// All live fields of the hash at `key`. Empty when absent.
    async fn hash_get_all(&self, key: &str) -> LimiterResult<HashMap<String, String>>;

    /// Increments `field` by `delta` and applies a field-level `ttl` under
    /// `mode`. Returns the field value after the increment.
    async fn hash_incr_with_expiry(
        &self,
        key: &str,
        field: &str,
        delta: i64,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<i64>;

    /// Number of live fields of the hash at `key`.
    async fn hash_len(&self, key: &str) -> LimiterResult<u64>;

    /// Writes `field` and applies a field-level `ttl` under `mode`.
    /// Returns whether the field was newly created.
    async fn hash_set_with_expiry(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> LimiterResult<bool>;
}
