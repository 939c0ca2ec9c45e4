//! Fixed window counter.
//!
//! One integer per client. The TTL is applied only when the counter is
//! created, so each window starts with the first request after the previous
//! one expired rather than on a wall-clock boundary.

use super::parse_count;
use crate::error::{LimiterError, LimiterResult};
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Algorithm, RateLimiter};
use crate::store::{ExpiryMode, SharedStateStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct FixedWindowCounter {
    store: Arc<dyn SharedStateStore>,
    keys: KeyGenerator,
    window: Duration,
    limit: u64,
}

impl FixedWindowCounter {
    pub fn new(store: Arc<dyn SharedStateStore>, window: Duration, limit: u64) -> Self {
        Self {
            store,
            keys: KeyGenerator::default(),
            window,
            limit,
        }
    }

    pub fn with_key_generator(mut self, keys: KeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

#[async_trait]
impl RateLimiter for FixedWindowCounter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }

    async fn try_decide(&self, client_id: &str) -> LimiterResult<bool> {
        let key = self.keys.client_key(client_id);

        let current = match self.store.get(&key).await? {
            Some(raw) => parse_count(&key, &raw)?,
            None => 0,
        };

        if current >= self.limit {
            debug!(client_id, current, limit = self.limit, "Fixed window exhausted");
            return Ok(false);
        }

        let updated = self
            .store
            .incr_with_expiry(&key, self.window, ExpiryMode::Nx)
            .await?;
        if updated <= 0 {
            return Err(LimiterError::StoreOperationFailed(format!(
                "increment of '{}' reported no change",
                key
            )));
        }

        debug!(client_id, count = updated, limit = self.limit, "Fixed window admitted");
        Ok(true)
    }
}
