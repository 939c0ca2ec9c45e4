//! Rate limiting algorithms.
//!
//! Each limiter is independent: it owns one store handle, one key generator
//! and its own parameters, and implements [`crate::RateLimiter`].

pub mod fixed_window;
pub mod sliding_window_counter;
pub mod sliding_window_log;

use crate::error::{LimiterError, LimiterResult};

pub use crate::token_bucket::TokenBucket;
pub use fixed_window::FixedWindowCounter;
pub use sliding_window_counter::SlidingWindowCounter;
pub use sliding_window_log::SlidingWindowLog;

/// Parses a stored counter. Anything but a non-negative integer is a
/// decode error, never a silent zero.
pub(crate) fn parse_count(key: &str, raw: &str) -> LimiterResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| LimiterError::decode(key, format!("'{}': {}", raw, e)))
}
