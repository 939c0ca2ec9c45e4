//! Custom field checks used by the `validator` derives in [`crate::config`]
//! and [`crate::rate_limit_config`].

use std::borrow::Cow;
use std::time::Duration;
use validator::ValidationError;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Redis URL must use the `redis://` or `rediss://` scheme.
pub fn validate_redis_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Err(invalid("redis_url", "Redis URL cannot be empty"));
    }

    if !url.starts_with("redis://") && !url.starts_with("rediss://") {
        return Err(invalid(
            "redis_url",
            "Redis URL must start with 'redis://' or 'rediss://'",
        ));
    }

    Ok(())
}

/// Windows must be a whole number of seconds, at least one; the algorithms
/// work in whole seconds.
pub fn validate_window(window: &Duration) -> Result<(), ValidationError> {
    if window.as_secs() == 0 {
        return Err(invalid("window", "Window must be at least one second"));
    }
    if window.subsec_nanos() != 0 {
        return Err(invalid("window", "Window must be a whole number of seconds"));
    }
    Ok(())
}

pub fn validate_refill_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(invalid(
            "refill_rate",
            "Refill rate must be a finite, non-negative number of tokens per second",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_redis_url() {
        assert!(validate_redis_url("redis://localhost:6379").is_ok());
        assert!(validate_redis_url("rediss://localhost:6379").is_ok());
    }

    #[test]
    fn test_invalid_redis_url() {
        assert!(validate_redis_url("").is_err());
        assert!(validate_redis_url("http://localhost:6379").is_err());
    }

    #[test]
    fn test_window() {
        assert!(validate_window(&Duration::from_secs(1)).is_ok());
        assert!(validate_window(&Duration::from_millis(999)).is_err());
        assert!(validate_window(&Duration::ZERO).is_err());
        assert!(validate_window(&Duration::from_millis(1_500)).is_err());
        assert!(validate_window(&Duration::from_secs(90)).is_ok());
    }

    #[test]
    fn test_refill_rate() {
        assert!(validate_refill_rate(0.0).is_ok());
        assert!(validate_refill_rate(2.5).is_ok());
        assert!(validate_refill_rate(-1.0).is_err());
        assert!(validate_refill_rate(f64::NAN).is_err());
        assert!(validate_refill_rate(f64::INFINITY).is_err());
    }
}
