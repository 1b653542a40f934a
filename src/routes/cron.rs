use axum::{
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{responses::JsonResponse, state::AppState, utils::signing::constant_time_eq};

#[derive(Debug, Deserialize)]
struct CronQuery {
    secret: Option<String>,
}

/// Proof that the caller knows `CRON_SECRET`. With no secret configured every
/// cron call is refused.
#[derive(Debug, Clone, Copy)]
pub struct CronSecret;

impl FromRequestParts<AppState> for CronSecret {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.cron_secret.as_deref() else {
            warn!(path = %parts.uri.path(), "cron call refused, CRON_SECRET is not set");
            return Err(JsonResponse::unauthorized());
        };

        let provided = Query::<CronQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.secret)
            .unwrap_or_default();

        if constant_time_eq(expected, &provided) {
            Ok(CronSecret)
        } else {
            warn!(path = %parts.uri.path(), "cron call with wrong secret");
            Err(JsonResponse::unauthorized())
        }
    }
}

pub async fn purge_rate_limits(_: CronSecret, State(state): State<AppState>) -> Response {
    match state.rate_limiter.purge_expired().await {
        Ok(purged) => {
            info!(purged, "expired rate limit buckets purged");
            Json(json!({ "success": true, "purged": purged })).into_response()
        }
        Err(err) => {
            error!(?err, "rate limit purge failed");
            JsonResponse::server_error("Purge failed")
        }
    }
}
