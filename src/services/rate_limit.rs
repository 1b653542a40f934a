//! Sliding-window rate limiting over a shared counter store.
//!
//! Two epoch-aligned fixed windows are kept per identifier and tier. The
//! estimate weights the previous window by the share of it still inside the
//! sliding window: `previous * (1 - elapsed_fraction) + current`. Only
//! admitted requests are counted, so a refused retry never extends the
//! throttle.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::rate_limit_store::{RateLimitStore, RateLimitStoreError};

pub const DEFAULT_STRICT_PREFIXES: &[&str] = &[
    "/api/auth/login",
    "/api/auth/register",
    "/api/auth/forgot-password",
    "/api/auth/reset-password",
    "/api/stripe",
    "/api/payments",
    "/api/admin/api-tokens",
    "/api/super-admin/api-tokens",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    Standard,
    Strict,
}

impl RateLimitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitTier::Standard => "standard",
            RateLimitTier::Strict => "strict",
        }
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    fn window_millis(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX).max(1)
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub standard: RateLimitPolicy,
    pub strict: RateLimitPolicy,
    pub strict_prefixes: Vec<String>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            standard: RateLimitPolicy::new(10, 10),
            strict: RateLimitPolicy::new(5, 60),
            strict_prefixes: DEFAULT_STRICT_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub success: bool,
    pub limit: u64,
    pub remaining: u64,
    /// End of the current fixed window.
    pub reset_at: DateTime<Utc>,
    /// Set when the store could not be consulted and the request was let through.
    pub degraded: bool,
}

impl RateLimitDecision {
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000).max(1)
    }
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    settings: RateLimitSettings,
    fail_open_events: AtomicU64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, settings: RateLimitSettings) -> Self {
        Self {
            store,
            settings,
            fail_open_events: AtomicU64::new(0),
        }
    }

    pub fn policy(&self, tier: RateLimitTier) -> RateLimitPolicy {
        match tier {
            RateLimitTier::Standard => self.settings.standard,
            RateLimitTier::Strict => self.settings.strict,
        }
    }

    /// Tier for an inbound path. Strict prefixes are checked first; paths
    /// outside `/api` are not limited.
    pub fn tier_for_path(&self, path: &str) -> Option<RateLimitTier> {
        let is_strict = self.settings.strict_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if is_strict {
            return Some(RateLimitTier::Strict);
        }

        if path == "/api" || path.starts_with("/api/") {
            Some(RateLimitTier::Standard)
        } else {
            None
        }
    }

    /// How many times the store was unreachable and requests were let through.
    pub fn fail_open_count(&self) -> u64 {
        self.fail_open_events.load(Ordering::Relaxed)
    }

    pub async fn allow(&self, identifier: &str, tier: RateLimitTier) -> RateLimitDecision {
        self.allow_at(identifier, tier, Utc::now()).await
    }

    pub async fn allow_at(
        &self,
        identifier: &str,
        tier: RateLimitTier,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let policy = self.policy(tier);
        let window_ms = policy.window_millis();
        let now_ms = now.timestamp_millis();
        let index = now_ms.div_euclid(window_ms);
        let elapsed_fraction = (now_ms - index * window_ms) as f64 / window_ms as f64;
        let reset_at = Utc
            .timestamp_millis_opt((index + 1) * window_ms)
            .single()
            .unwrap_or(now);

        match self.admit(identifier, tier, policy, index, elapsed_fraction).await {
            Ok((success, estimate)) => {
                let remaining = (policy.limit as f64 - estimate).floor().max(0.0) as u64;
                if !success {
                    debug!(%identifier, %tier, estimate, "rate limit exceeded");
                }
                RateLimitDecision {
                    success,
                    limit: policy.limit,
                    remaining,
                    reset_at,
                    degraded: false,
                }
            }
            Err(err) => {
                let events = self.fail_open_events.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    ?err,
                    %identifier,
                    %tier,
                    fail_open_events = events,
                    "rate limit store unavailable, allowing request"
                );
                RateLimitDecision {
                    success: true,
                    limit: policy.limit,
                    remaining: policy.limit,
                    reset_at,
                    degraded: true,
                }
            }
        }
    }

    /// Drops expired counters from the store.
    pub async fn purge_expired(&self) -> Result<u64, RateLimitStoreError> {
        self.store.purge_expired().await
    }

    /// Reads both windows, then counts the request only when it fits. Returns
    /// whether it was admitted and the estimate including it.
    async fn admit(
        &self,
        identifier: &str,
        tier: RateLimitTier,
        policy: RateLimitPolicy,
        index: i64,
        elapsed_fraction: f64,
    ) -> Result<(bool, f64), RateLimitStoreError> {
        let current_key = bucket_key(tier, identifier, index);
        let current = self.store.get(&current_key).await?;
        let previous = self
            .store
            .get(&bucket_key(tier, identifier, index - 1))
            .await?;

        let admitted = previous as f64 * (1.0 - elapsed_fraction) + current as f64;
        if admitted >= policy.limit as f64 {
            return Ok((false, admitted + 1.0));
        }

        // Counters outlive their own window so the next one can read them.
        let counted = self.store.increment(&current_key, policy.window * 2).await?;
        let estimate = previous as f64 * (1.0 - elapsed_fraction) + counted as f64;
        Ok((true, estimate))
    }
}

fn bucket_key(tier: RateLimitTier, identifier: &str, index: i64) -> String {
    format!("{tier}:{identifier}:{index}")
}
