use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Errors surfaced by keyed-store backends.
#[derive(Debug, Clone)]
pub enum StoreError {
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(s) => write!(f, "keyed store error: {}", s),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Low-latency keyed store holding all volatile game state.
///
/// Every call is a suspension point; no mutation may span multiple calls
/// without holding the appropriate lock (see [`crate::LockManager`]).
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Set with TTL, overwriting any current value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
    /// Atomic set-if-absent with TTL. Returns true if the key was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;
    /// Atomic "delete only if current value equals `expected`".
    ///
    /// Returns true if the key was deleted. Required for lock release: TTL
    /// expiry followed by a new acquirer must not be released by the stale
    /// holder.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
    /// Enumerate keys matching a glob pattern (`*` wildcards).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
    /// Refresh a key's TTL. No-op if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;
    /// Fire-and-forget publish to a pub/sub channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError>;
    /// Subscribe to a pub/sub channel. Delivery is at-least-once; the
    /// receiver ends when the backing connection closes.
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, StoreError>;
}
