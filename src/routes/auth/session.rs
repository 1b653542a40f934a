use axum::{extract::FromRequestParts, http::request::Parts, response::Response};

use crate::{
    responses::JsonResponse, routes::auth::claims::IdentityContext, state::AppState,
};

/// The caller's identity. Taken from the request gate when it already ran,
/// otherwise verified from the request's own credentials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthSession(pub IdentityContext);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<IdentityContext>() {
            return Ok(AuthSession(*identity));
        }

        state
            .tokens
            .verify_headers(&parts.headers)
            .identity()
            .map(AuthSession)
            .ok_or_else(JsonResponse::unauthorized)
    }
}
