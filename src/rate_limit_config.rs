use crate::algorithms::{FixedWindowCounter, SlidingWindowCounter, SlidingWindowLog, TokenBucket};
use crate::config_validator::{validate_refill_rate, validate_window};
use crate::error::LimiterResult;
use crate::key_generator::KeyGenerator;
use crate::rate_limiter::{Algorithm, RateLimiter};
use crate::store::SharedStateStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::{Validate, ValidationErrors};

/// Parameters of one limiter, tagged by algorithm.
///
/// ```json
/// { "algorithm": "fixed_window", "limit": 100, "window": "1m" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum LimiterSettings {
    FixedWindow(FixedWindowSettings),
    SlidingWindowCounter(SlidingWindowCounterSettings),
    SlidingWindowLog(SlidingWindowLogSettings),
    TokenBucket(TokenBucketSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FixedWindowSettings {
    #[validate(range(min = 1))]
    pub limit: u64,
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_window"))]
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SlidingWindowCounterSettings {
    #[validate(range(min = 1))]
    pub limit: u64,
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_window"))]
    pub sub_window: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SlidingWindowLogSettings {
    #[validate(range(min = 1))]
    pub limit: u64,
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_window"))]
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TokenBucketSettings {
    #[validate(range(min = 1))]
    pub capacity: u64,
    /// Tokens added per second.
    #[validate(custom(function = "validate_refill_rate"))]
    pub refill_rate: f64,
}

impl LimiterSettings {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            LimiterSettings::FixedWindow(_) => Algorithm::FixedWindow,
            LimiterSettings::SlidingWindowCounter(_) => Algorithm::SlidingWindowCounter,
            LimiterSettings::SlidingWindowLog(_) => Algorithm::SlidingWindowLog,
            LimiterSettings::TokenBucket(_) => Algorithm::TokenBucket,
        }
    }
}

impl Validate for LimiterSettings {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            LimiterSettings::FixedWindow(settings) => settings.validate(),
            LimiterSettings::SlidingWindowCounter(settings) => settings.validate(),
            LimiterSettings::SlidingWindowLog(settings) => settings.validate(),
            LimiterSettings::TokenBucket(settings) => settings.validate(),
        }
    }
}

/// Validates `settings` and builds the matching limiter over `store`.
pub fn build_limiter(
    settings: &LimiterSettings,
    store: Arc<dyn SharedStateStore>,
    keys: KeyGenerator,
) -> LimiterResult<Box<dyn RateLimiter>> {
    settings.validate()?;

    let limiter: Box<dyn RateLimiter> = match settings {
        LimiterSettings::FixedWindow(s) => Box::new(
            FixedWindowCounter::new(store, s.window, s.limit).with_key_generator(keys),
        ),
        LimiterSettings::SlidingWindowCounter(s) => Box::new(
            SlidingWindowCounter::new(store, s.limit, s.sub_window).with_key_generator(keys),
        ),
        LimiterSettings::SlidingWindowLog(s) => Box::new(
            SlidingWindowLog::new(store, s.limit, s.window).with_key_generator(keys),
        ),
        LimiterSettings::TokenBucket(s) => Box::new(
            TokenBucket::new(store, s.capacity, s.refill_rate).with_key_generator(keys),
        ),
    };

    Ok(limiter)
}
