use crate::error::{LimiterError, LimiterResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The four decision protocols shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    FixedWindow,
    SlidingWindowCounter,
    SlidingWindowLog,
    TokenBucket,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "fixed_window",
            Algorithm::SlidingWindowCounter => "sliding_window_counter",
            Algorithm::SlidingWindowLog => "sliding_window_log",
            Algorithm::TokenBucket => "token_bucket",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed_window" | "fixed_window_counter" => Ok(Algorithm::FixedWindow),
            "sliding_window_counter" => Ok(Algorithm::SlidingWindowCounter),
            "sliding_window_log" => Ok(Algorithm::SlidingWindowLog),
            "token_bucket" => Ok(Algorithm::TokenBucket),
            other => Err(LimiterError::Configuration(format!(
                "Unknown rate limiting algorithm '{}'",
                other
            ))),
        }
    }
}

/// Admission decision for a client against a quota held in the shared store.
///
/// Implementations keep no per-client state in memory; everything lives in
/// the [`crate::SharedStateStore`] handed to their constructor.
///
/// The limit check and the commit that follows it are separate store calls.
/// Concurrent callers for the same client can therefore both pass the check,
/// so a burst of `n` simultaneous requests may over-admit by up to `n - 1`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Runs the decision protocol, surfacing store and decode failures.
    async fn try_decide(&self, client_id: &str) -> LimiterResult<bool>;

    /// `true` to admit the request. Any failure denies it (fail-closed).
    async fn decide(&self, client_id: &str) -> bool {
        match self.try_decide(client_id).await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(
                    target: "quotakeeper::limiter",
                    client_id = %client_id,
                    algorithm = %self.algorithm(),
                    kind = err.kind(),
                    error = %err,
                    "Denying request after store failure"
                );
                false
            }
        }
    }
}
