use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, error, info};

use crate::state::AppState;

pub const RATE_LIMIT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drops expired rate-limit buckets until `shutdown` flips to true.
pub fn start_background_workers(
    state: AppState,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("rate limit purge worker stopping");
                    break;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            match state.rate_limiter.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "purged expired rate limit buckets"),
                Err(err) => error!(?err, "rate limit purge failed"),
            }
        }
    })
}
