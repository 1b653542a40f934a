use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{responses::JsonResponse, services::token::AUTH_COOKIE_NAME};

/// Expires the identity cookie whether or not the request carried one.
pub async fn handle_logout(jar: CookieJar) -> Response {
    let expired = Cookie::build((AUTH_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO);
    let jar = jar.add(expired);
    (jar, JsonResponse::success("Logged out")).into_response()
}
