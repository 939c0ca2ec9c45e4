pub mod algorithms;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod key_generator;
pub mod memory;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod redis;
pub mod store;
pub mod token_bucket;

pub use algorithms::{FixedWindowCounter, SlidingWindowCounter, SlidingWindowLog, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{LimiterError, LimiterResult};
pub use key_generator::KeyGenerator;
pub use memory::InMemoryStore;
pub use rate_limit_config::{build_limiter, LimiterSettings};
pub use rate_limiter::{Algorithm, RateLimiter};
pub use crate::redis::RedisStore;
pub use store::{ExpiryMode, SharedStateStore, MAX_TTL};
