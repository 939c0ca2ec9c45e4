use thiserror::Error;

/// Failures a limiter can run into while talking to the shared store.
///
/// None of these are retried. [`crate::RateLimiter::decide`] turns every one
/// of them into a denial.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimiterError {
    /// The store could not be reached (IO error, refused or dropped
    /// connection, timeout).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store executed the command but reported a failure, or the
    /// primitive signalled that it did nothing.
    #[error("store operation failed: {0}")]
    StoreOperationFailed(String),

    /// A stored value could not be parsed as the expected number.
    #[error("cannot decode stored value for key '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl LimiterError {
    pub fn decode(key: impl Into<String>, reason: impl ToString) -> Self {
        LimiterError::Decode {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly label, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            LimiterError::StoreUnavailable(_) => "store_unavailable",
            LimiterError::StoreOperationFailed(_) => "store_operation_failed",
            LimiterError::Decode { .. } => "decode_error",
            LimiterError::Configuration(_) => "configuration_error",
        }
    }
}

impl From<redis::RedisError> for LimiterError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            LimiterError::StoreUnavailable(err.to_string())
        } else if err.kind() == redis::ErrorKind::TypeError {
            LimiterError::Decode {
                key: String::from("<reply>"),
                reason: err.to_string(),
            }
        } else {
            LimiterError::StoreOperationFailed(err.to_string())
        }
    }
}

impl From<envconfig::Error> for LimiterError {
    fn from(err: envconfig::Error) -> Self {
        LimiterError::Configuration(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LimiterError {
    fn from(err: validator::ValidationErrors) -> Self {
        LimiterError::Configuration(err.to_string())
    }
}

pub type LimiterResult<T> = Result<T, LimiterError>;
