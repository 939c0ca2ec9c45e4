//! Key naming for limiter state in the shared store.
//!
//! Every process that limits the same client must agree on these names, so
//! they are part of the externally visible contract:
//!
//! - `rate_limit:<client>` holds the fixed window counter, the sub-window
//!   hash or the request log hash (depending on the algorithm).
//! - `rate_limit:<client>:count` and `rate_limit:<client>:lastRefill` hold
//!   the token bucket.

pub const DEFAULT_NAMESPACE: &str = "rate_limit";

const TOKEN_COUNT_SUFFIX: &str = "count";
const LAST_REFILL_SUFFIX: &str = "lastRefill";

/// Builds store keys for a client under a namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyGenerator {
    namespace: String,
}

impl KeyGenerator {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key shared by the window counter, sub-window and log algorithms.
    pub fn client_key(&self, client_id: &str) -> String {
        format!("{}:{}", self.namespace, client_id)
    }

    pub fn token_count_key(&self, client_id: &str) -> String {
        format!("{}:{}:{}", self.namespace, client_id, TOKEN_COUNT_SUFFIX)
    }

    pub fn last_refill_key(&self, client_id: &str) -> String {
        format!("{}:{}:{}", self.namespace, client_id, LAST_REFILL_SUFFIX)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
