//! Optional whole-site password. The cookie holds an HMAC derived from the
//! password, never the password itself.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    responses::JsonResponse,
    state::AppState,
    utils::signing::{constant_time_eq, hmac_hex},
};

pub const SITE_ACCESS_COOKIE: &str = "site-access";
pub const SITE_ACCESS_PATH: &str = "/site-access";
const SITE_ACCESS_LABEL: &[u8] = b"tenantgate-site-access-v1";
const SITE_ACCESS_MAX_AGE_DAYS: i64 = 30;

pub fn access_token(site_password: &str) -> String {
    hmac_hex(site_password.as_bytes(), SITE_ACCESS_LABEL)
}

pub fn has_site_access(headers: &HeaderMap, site_password: &str) -> bool {
    let jar = CookieJar::from_headers(headers);
    jar.get(SITE_ACCESS_COOKIE)
        .is_some_and(|cookie| constant_time_eq(&access_token(site_password), cookie.value()))
}

/// Only same-site absolute paths are followed after unlocking. Browsers drop
/// tabs and newlines from a Location value, so any whitespace or control
/// character disqualifies the target.
pub fn safe_redirect(target: Option<&str>) -> &str {
    match target {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path
                    .chars()
                    .any(|c| c == '\\' || c.is_whitespace() || c.is_control()) =>
        {
            path
        }
        _ => "/",
    }
}

pub fn unlock_location(original: &str) -> String {
    format!(
        "{SITE_ACCESS_PATH}?redirect={}",
        urlencoding::encode(original)
    )
}

#[derive(Debug, Deserialize)]
pub struct SiteAccessRequest {
    pub password: String,
    pub redirect: Option<String>,
}

pub async fn submit_site_access(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SiteAccessRequest>,
) -> Response {
    let Some(site_password) = state.config.site_password.as_deref() else {
        return JsonResponse::not_found();
    };

    if !constant_time_eq(site_password, &payload.password) {
        warn!("site access refused");
        return JsonResponse::unauthorized();
    }

    let cookie = Cookie::build((SITE_ACCESS_COOKIE, access_token(site_password)))
        .http_only(true)
        .secure(state.config.production)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::days(SITE_ACCESS_MAX_AGE_DAYS));

    info!("site access granted");
    let target = safe_redirect(payload.redirect.as_deref()).to_string();
    (jar.add(cookie), Redirect::to(&target)).into_response()
}
