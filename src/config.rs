use crate::config_validator::validate_redis_url;
use crate::error::{LimiterError, LimiterResult};
use crate::key_generator::KeyGenerator;
use crate::rate_limit_config::{
    FixedWindowSettings, LimiterSettings, SlidingWindowCounterSettings, SlidingWindowLogSettings,
    TokenBucketSettings,
};
use crate::rate_limiter::Algorithm;
use envconfig::Envconfig;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use validator::Validate;

static NAMESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("namespace pattern is valid"));

#[derive(Debug, Envconfig, Clone, Validate)]
pub struct Config {
    /// Redis connection URL
    #[envconfig(from = "REDIS_URL", default = "redis://127.0.0.1:6379")]
    #[validate(custom(function = "validate_redis_url"))]
    pub redis_url: String,

    /// Prefix of every key the limiter writes
    #[envconfig(from = "RATE_LIMIT_NAMESPACE", default = "rate_limit")]
    #[validate(regex(path = *NAMESPACE_PATTERN))]
    pub namespace: String,

    #[envconfig(from = "RATE_LIMIT_ALGORITHM", default = "fixed_window")]
    pub algorithm: Algorithm,

    /// Requests per window (window and log algorithms)
    #[envconfig(from = "RATE_LIMIT_LIMIT", default = "100")]
    pub limit: u64,

    #[envconfig(from = "RATE_LIMIT_WINDOW_SECS", default = "60")]
    pub window_secs: u64,

    #[envconfig(from = "RATE_LIMIT_SUB_WINDOW_SECS", default = "10")]
    pub sub_window_secs: u64,

    #[envconfig(from = "RATE_LIMIT_BUCKET_CAPACITY", default = "100")]
    pub bucket_capacity: u64,

    /// Tokens per second
    #[envconfig(from = "RATE_LIMIT_REFILL_RATE", default = "1.0")]
    pub refill_rate: f64,
}

impl Config {
    /// Load configuration from `.env` (if present) and the environment
    pub fn from_env() -> LimiterResult<Self> {
        dotenv::dotenv().ok();
        let config = Config::init_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`Config::from_env`] over an explicit variable map
    pub fn from_map(vars: &HashMap<String, String>) -> LimiterResult<Self> {
        let config = Config::init_from_hashmap(vars)?;
        config.validate()?;
        Ok(config)
    }

    pub fn key_generator(&self) -> KeyGenerator {
        KeyGenerator::new(self.namespace.clone())
    }

    /// Limiter parameters for the configured algorithm
    pub fn settings(&self) -> LimiterResult<LimiterSettings> {
        let settings = match self.algorithm {
            Algorithm::FixedWindow => LimiterSettings::FixedWindow(FixedWindowSettings {
                limit: self.limit,
                window: Duration::from_secs(self.window_secs),
            }),
            Algorithm::SlidingWindowCounter => {
                LimiterSettings::SlidingWindowCounter(SlidingWindowCounterSettings {
                    limit: self.limit,
                    sub_window: Duration::from_secs(self.sub_window_secs),
                })
            }
            Algorithm::SlidingWindowLog => {
                LimiterSettings::SlidingWindowLog(SlidingWindowLogSettings {
                    limit: self.limit,
                    window: Duration::from_secs(self.window_secs),
                })
            }
            Algorithm::TokenBucket => LimiterSettings::TokenBucket(TokenBucketSettings {
                capacity: self.bucket_capacity,
                refill_rate: self.refill_rate,
            }),
        };

        settings.validate().map_err(|e| {
            LimiterError::Configuration(format!("{} settings: {}", self.algorithm, e))
        })?;
        Ok(settings)
    }
}
