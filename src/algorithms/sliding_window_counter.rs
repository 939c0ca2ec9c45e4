//! Sliding window counter.
//!
//! Approximates a continuous window with one hash field per sub-window
//! (`floor(now / sub_window)`), each expiring on its own. The admitted load
//! is the sum of the fields still alive, so memory stays bounded by the
//! number of live sub-windows instead of the number of requests.

use super::parse_count;
use crate::clock::{Clock, SystemClock};
use crate::error::{LimiterError, LimiterResult};
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Algorithm, RateLimiter};
use crate::store::{ExpiryMode, SharedStateStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SlidingWindowCounter {
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    keys: KeyGenerator,
    limit: u64,
    sub_window: Duration,
}

impl SlidingWindowCounter {
    pub fn new(store: Arc<dyn SharedStateStore>, limit: u64, sub_window: Duration) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            keys: KeyGenerator::default(),
            limit,
            sub_window,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_key_generator(mut self, keys: KeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn sub_window(&self) -> Duration {
        self.sub_window
    }

    fn sub_window_secs(&self) -> u64 {
        self.sub_window.as_secs().max(1)
    }

    /// Hash field naming the sub-window that contains `now_secs`.
    pub fn sub_window_id(&self, now_secs: u64) -> u64 {
        now_secs / self.sub_window_secs()
    }

    /// Lifetime of a sub-window field. Ids are whole seconds, so the TTL is
    /// too; a fractional sub-window would otherwise outlive its id.
    pub fn field_ttl(&self) -> Duration {
        Duration::from_secs(self.sub_window_secs())
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowCounter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindowCounter
    }

    async fn try_decide(&self, client_id: &str) -> LimiterResult<bool> {
        let key = self.keys.client_key(client_id);

        let mut total: u64 = 0;
        for raw in self.store.hash_get_all(&key).await?.values() {
            total = total.saturating_add(parse_count(&key, raw)?);
        }

        if total >= self.limit {
            debug!(client_id, total, limit = self.limit, "Sliding window counter exhausted");
            return Ok(false);
        }

        let sub_window_id = self.sub_window_id(self.clock.now_secs());
        let updated = self
            .store
            .hash_incr_with_expiry(
                &key,
                &sub_window_id.to_string(),
                1,
                self.field_ttl(),
                ExpiryMode::Nx,
            )
            .await?;
        if updated <= 0 {
            return Err(LimiterError::StoreOperationFailed(format!(
                "increment of '{}' field {} reported no change",
                key, sub_window_id
            )));
        }

        debug!(
            client_id,
            total = total + 1,
            sub_window_id,
            limit = self.limit,
            "Sliding window counter admitted"
        );
        Ok(true)
    }
}
