//! Sliding window log.
//!
//! Every admitted request leaves one hash field, keyed by a fresh UUID and
//! expiring `window` after its own insertion. The number of live fields is
//! the exact count of requests in the trailing window.

use crate::clock::{Clock, SystemClock};
use crate::error::LimiterResult;
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Algorithm, RateLimiter};
use crate::store::{ExpiryMode, SharedStateStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub struct SlidingWindowLog {
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    keys: KeyGenerator,
    limit: u64,
    window: Duration,
}

impl SlidingWindowLog {
    pub fn new(store: Arc<dyn SharedStateStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            keys: KeyGenerator::default(),
            limit,
            window,
        }
    }

    /// Clock used for the insertion timestamp stored with each entry.
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

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLog {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindowLog
    }

    async fn try_decide(&self, client_id: &str) -> LimiterResult<bool> {
        let key = self.keys.client_key(client_id);

        let logged = self.store.hash_len(&key).await?;
        if logged >= self.limit {
            debug!(client_id, logged, limit = self.limit, "Sliding window log full");
            return Ok(false);
        }

        let entry_id = Uuid::new_v4().to_string();
        self.store
            .hash_set_with_expiry(
                &key,
                &entry_id,
                &self.clock.now_secs().to_string(),
                self.window,
                ExpiryMode::Nx,
            )
            .await?;

        debug!(
            client_id,
            logged = logged + 1,
            entry_id = %entry_id,
            limit = self.limit,
            "Sliding window log admitted"
        );
        Ok(true)
    }
}
