use crate::algorithms::parse_count;
use crate::clock::{Clock, SystemClock};
use crate::error::LimiterResult;
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Algorithm, RateLimiter};
use crate::store::{SharedStateStore, MAX_TTL};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Token bucket refilled lazily on each request.
///
/// State is a pair of scalars, `<key>:count` and `<key>:lastRefill` (unix
/// seconds). Every call persists the pair, denials included, so
/// `lastRefill` always advances.
pub struct TokenBucket {
    store: Arc<dyn SharedStateStore>,
    clock: Arc<dyn Clock>,
    keys: KeyGenerator,
    capacity: u64,
    refill_rate: f64, // tokens per second
}

/// Token count and refill time as read from, or written to, the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub tokens: u64,
    pub last_refill: u64,
}

impl TokenBucket {
    pub fn new(store: Arc<dyn SharedStateStore>, capacity: u64, refill_rate: f64) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            keys: KeyGenerator::default(),
            capacity,
            refill_rate,
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

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Applies the refill for `now` to `stored` and takes one token if any
    /// is left. Returns whether the request is admitted and the state to
    /// persist.
    pub fn refill_and_take(&self, stored: BucketState, now: u64) -> (bool, BucketState) {
        let (mut tokens, last_refill) = if stored.last_refill == 0 {
            (self.capacity, now)
        } else {
            (stored.tokens, stored.last_refill)
        };

        // A writer with a clock ahead of ours may have stored a future time.
        let elapsed = now.saturating_sub(last_refill);
        let tokens_to_add = (elapsed as f64 * self.refill_rate).floor() as u64;
        tokens = tokens.saturating_add(tokens_to_add).min(self.capacity);

        let allowed = tokens > 0;
        if allowed {
            tokens -= 1;
        }

        (
            allowed,
            BucketState {
                tokens,
                last_refill: now,
            },
        )
    }

    /// Time for an empty bucket to fill back up. Once the stored pair has
    /// been idle that long it is indistinguishable from a fresh bucket, so
    /// it is written with this TTL. `None` when the bucket never refills
    /// or takes longer than [`MAX_TTL`] to do so.
    pub fn idle_ttl(&self) -> Option<Duration> {
        if !(self.refill_rate > 0.0 && self.refill_rate.is_finite()) {
            return None;
        }
        let secs = (self.capacity as f64 / self.refill_rate).ceil().max(1.0);
        Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|ttl| *ttl <= MAX_TTL)
    }

    async fn load(&self, count_key: &str, refill_key: &str) -> LimiterResult<BucketState> {
        let values = self.store.get_many(&[count_key, refill_key]).await?;
        let mut values = values.into_iter();

        let tokens = match values.next().flatten() {
            Some(raw) => parse_count(count_key, &raw)?,
            None => 0,
        };
        let last_refill = match values.next().flatten() {
            Some(raw) => parse_count(refill_key, &raw)?,
            None => 0,
        };

        Ok(BucketState {
            tokens,
            last_refill,
        })
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }

    async fn try_decide(&self, client_id: &str) -> LimiterResult<bool> {
        let count_key = self.keys.token_count_key(client_id);
        let refill_key = self.keys.last_refill_key(client_id);
        let now = self.clock.now_secs();

        let stored = self.load(&count_key, &refill_key).await?;
        let (allowed, next) = self.refill_and_take(stored, now);

        self.store
            .set_many_with_expiry(
                &[
                    (count_key.as_str(), next.tokens.to_string()),
                    (refill_key.as_str(), next.last_refill.to_string()),
                ],
                self.idle_ttl(),
            )
            .await?;

        debug!(
            client_id,
            allowed,
            tokens = next.tokens,
            capacity = self.capacity,
            "Token bucket decision"
        );
        Ok(allowed)
    }
}
