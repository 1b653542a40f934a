use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    models::user::PublicUser,
    responses::JsonResponse,
    services::token::AUTH_COOKIE_NAME,
    state::AppState,
    utils::password::verify_password,
};

use super::session::AuthSession;

#[derive(Deserialize, Serialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

pub async fn handle_login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Response {
    let user = match app_state.users.find_user_by_email(&payload.email).await {
        Ok(Some(record)) => record,
        Ok(None) => return JsonResponse::invalid_credentials(),
        Err(err) => {
            error!(?err, "user lookup failed during login");
            return JsonResponse::server_error("Database error");
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return JsonResponse::invalid_credentials(),
        Err(err) => {
            warn!(?err, user_id = %user.id, "stored password hash is unusable");
            return JsonResponse::invalid_credentials();
        }
    }

    let issued = match app_state
        .tokens
        .issue(user.id, user.role, user.organization_id)
    {
        Ok(issued) => issued,
        Err(err) => {
            warn!(?err, user_id = %user.id, "refusing to issue token");
            return JsonResponse::invalid_credentials();
        }
    };

    let cookie = Cookie::build((AUTH_COOKIE_NAME, issued.token.clone()))
        .http_only(true)
        .secure(app_state.config.production)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(issued.max_age_seconds()));

    info!(user_id = %user.id, role = %user.role, "user logged in");
    (
        jar.add(cookie),
        Json(json!({
            "success": true,
            "user": PublicUser::from(&user),
        })),
    )
        .into_response()
}

pub async fn handle_me(AuthSession(identity): AuthSession) -> Response {
    Json(json!({
        "success": true,
        "user": identity,
    }))
    .into_response()
}
