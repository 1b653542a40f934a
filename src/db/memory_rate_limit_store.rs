use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::rate_limit_store::{RateLimitStore, RateLimitStoreError};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u64,
    expires_at: Instant,
}

/// Process-local counters. Limits only hold for a single server instance.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    buckets: DashMap<String, Bucket>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, RateLimitStoreError> {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            count: 0,
            expires_at: now + ttl,
        });

        if bucket.expires_at <= now {
            bucket.count = 0;
            bucket.expires_at = now + ttl;
        }
        bucket.count = bucket.count.saturating_add(1);
        Ok(bucket.count)
    }

    async fn get(&self, key: &str) -> Result<u64, RateLimitStoreError> {
        let now = Instant::now();
        Ok(self
            .buckets
            .get(key)
            .filter(|bucket| bucket.expires_at > now)
            .map(|bucket| bucket.count)
            .unwrap_or(0))
    }

    async fn purge_expired(&self) -> Result<u64, RateLimitStoreError> {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| bucket.expires_at > now);
        Ok(before.saturating_sub(self.buckets.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_up_within_ttl() {
        let store = MemoryRateLimitStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.increment("a", ttl).await.unwrap(), 1);
        assert_eq!(store.increment("a", ttl).await.unwrap(), 2);
        assert_eq!(store.increment("b", ttl).await.unwrap(), 1);
        assert_eq!(store.get("a").await.unwrap(), 2);
        assert_eq!(store.get("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_counters_restart_and_purge() {
        let store = MemoryRateLimitStore::new();
        store.increment("a", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), 0);
        assert_eq!(store.increment("a", Duration::ZERO).await.unwrap(), 1);

        store.increment("live", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
