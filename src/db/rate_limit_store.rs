use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("rate limit store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Shared counter store behind the rate limiter. Implementations must make
/// `increment` atomic across every server instance that shares the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Increments the counter at `key` and returns the new value. A missing or
    /// expired counter restarts at 1 and lives for `ttl`.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, RateLimitStoreError>;

    /// Current value of a live counter, 0 when absent or expired.
    async fn get(&self, key: &str) -> Result<u64, RateLimitStoreError>;

    /// Drops expired counters, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, RateLimitStoreError>;
}
