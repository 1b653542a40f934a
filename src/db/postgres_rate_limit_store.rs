use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use super::rate_limit_store::{RateLimitStore, RateLimitStoreError};

pub struct PostgresRateLimitStore {
    pub pool: PgPool,
}

#[async_trait]
impl RateLimitStore for PostgresRateLimitStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64, RateLimitStoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limit_buckets (key, count, expires_at)
            VALUES ($1, 1, now() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE
            SET count = CASE
                    WHEN rate_limit_buckets.expires_at <= now() THEN 1
                    ELSE rate_limit_buckets.count + 1
                END,
                expires_at = CASE
                    WHEN rate_limit_buckets.expires_at <= now() THEN EXCLUDED.expires_at
                    ELSE rate_limit_buckets.expires_at
                END
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn get(&self, key: &str) -> Result<u64, RateLimitStoreError> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT count FROM rate_limit_buckets WHERE key = $1 AND expires_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.and_then(|c| u64::try_from(c).ok()).unwrap_or(0))
    }

    async fn purge_expired(&self) -> Result<u64, RateLimitStoreError> {
        let result = sqlx::query("DELETE FROM rate_limit_buckets WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
