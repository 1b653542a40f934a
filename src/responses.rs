use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl JsonResponse {
    fn error(status: StatusCode, code: &str, message: Option<&str>) -> Response {
        (
            status,
            Json(JsonResponse {
                success: false,
                error: Some(code.to_string()),
                message: message.map(str::to_string),
                retry_after: None,
            }),
        )
            .into_response()
    }

    pub fn success(msg: &str) -> Response {
        (
            StatusCode::OK,
            Json(JsonResponse {
                success: true,
                error: None,
                message: Some(msg.to_string()),
                retry_after: None,
            }),
        )
            .into_response()
    }

    /// The reason a credential was rejected is never part of the body.
    pub fn unauthorized() -> Response {
        Self::error(StatusCode::UNAUTHORIZED, "unauthorized", None)
    }

    pub fn invalid_credentials() -> Response {
        Self::error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            Some("Invalid email or password"),
        )
    }

    pub fn site_locked() -> Response {
        Self::error(StatusCode::UNAUTHORIZED, "site_locked", None)
    }

    pub fn forbidden() -> Response {
        Self::error(StatusCode::FORBIDDEN, "forbidden", None)
    }

    pub fn forbidden_with_message(msg: &str) -> Response {
        Self::error(StatusCode::FORBIDDEN, "forbidden", Some(msg))
    }

    pub fn not_found() -> Response {
        Self::error(StatusCode::NOT_FOUND, "not_found", None)
    }

    pub fn bad_request(msg: &str) -> Response {
        Self::error(StatusCode::BAD_REQUEST, "bad_request", Some(msg))
    }

    pub fn server_error(msg: &str) -> Response {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some(msg))
    }

    pub fn too_many_requests(retry_after: u64) -> Response {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(JsonResponse {
                success: false,
                error: Some("too_many_requests".to_string()),
                message: None,
                retry_after: Some(retry_after),
            }),
        )
            .into_response()
    }

    /// 302 to the login page, carrying the original path and query.
    pub fn redirect_to_login(original: &str) -> Response {
        found(&format!("/login?redirect={}", urlencoding::encode(original)))
    }
}

/// Plain 302; axum's `Redirect` only offers 303/307/308.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
