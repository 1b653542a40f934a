//! The per-request pipeline: rate limit, site password, identity, tenant.
//! Each step can end the request; later steps never run after a rejection.

pub mod path;
pub mod site_access;

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::{SecondsFormat, Utc};
use tracing::debug;

use crate::{
    responses::{found, JsonResponse},
    services::{rate_limit::RateLimitDecision, tenant::TenantResolution, token::TokenVerification},
    state::AppState,
    utils::ip::client_identifier,
};

use self::{
    path::{classify, Area, RouteClass},
    site_access::{has_site_access, unlock_location},
};

pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Tenant resolved for a page request.
#[derive(Debug, Clone)]
pub struct TenantContext(pub TenantResolution);

pub async fn request_gate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let class = classify(&path);
    if class.area == Area::Asset {
        return next.run(req).await;
    }

    let original = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let mut limit_decision = None;
    if class.api {
        if let Some(tier) = state.rate_limiter.tier_for_path(&path) {
            let connect_info = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            let identifier = client_identifier(
                req.headers(),
                connect_info,
                state.config.trust_proxy_headers,
            );

            let decision = state.rate_limiter.allow(&identifier, tier).await;
            if !decision.success {
                debug!(%identifier, %tier, %path, "request rate limited");
                let retry_after = decision.retry_after_secs(Utc::now());
                let mut response = JsonResponse::too_many_requests(retry_after);
                apply_rate_limit_headers(response.headers_mut(), &decision);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
            limit_decision = Some(decision);
        }
    }

    let outcome = gate_request(&state, &mut req, class, &original).await;
    let mut response = match outcome {
        Ok(()) => next.run(req).await,
        Err(rejection) => rejection,
    };

    if let Some(decision) = &limit_decision {
        apply_rate_limit_headers(response.headers_mut(), decision);
    }
    response
}

async fn gate_request(
    state: &AppState,
    req: &mut Request,
    class: RouteClass,
    original: &str,
) -> Result<(), Response> {
    let api = class.api;

    if let Some(site_password) = state.config.site_password.as_deref() {
        if class.site_gated() && !has_site_access(req.headers(), site_password) {
            return Err(if api {
                JsonResponse::site_locked()
            } else {
                found(&unlock_location(original))
            });
        }
    }

    if class.requires_identity() {
        match state.tokens.verify_headers(req.headers()) {
            TokenVerification::Valid(identity) => {
                req.extensions_mut().insert(identity);
            }
            TokenVerification::Invalid(reason) => {
                debug!(?reason, %original, "protected area without valid identity");
                return Err(if api {
                    JsonResponse::unauthorized()
                } else {
                    JsonResponse::redirect_to_login(original)
                });
            }
        }
    }

    if !api {
        let host = request_host(req.headers());
        let resolution = state.tenants.resolve(&host).await;
        req.extensions_mut().insert(TenantContext(resolution));
    }

    Ok(())
}

pub fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );
    let reset = decision.reset_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Extension, Json, Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        db::mock_db::{sample_organization, MockDb},
        models::{plan::PlanTier, user::UserRole},
        routes::auth::claims::IdentityContext,
        services::rate_limit::RateLimitPolicy,
        state::test_support::test_state,
    };

    async fn echo_identity(Extension(identity): Extension<IdentityContext>) -> impl IntoResponse {
        Json(json!({ "userId": identity.user_id }))
    }

    async fn echo_tenant(req: Request<Body>) -> impl IntoResponse {
        let slug = req
            .extensions()
            .get::<TenantContext>()
            .and_then(|ctx| ctx.0.organization().map(|o| o.slug.clone()));
        Json(json!({ "tenant": slug }))
    }

    async fn ok() -> &'static str {
        "ok"
    }

    fn app_with(db: Arc<MockDb>, configure: impl FnOnce(&mut Config)) -> (Router, AppState) {
        let state = test_state(db, configure);
        let router = Router::new()
            .route("/api/admin/whoami", get(echo_identity))
            .route("/admin/dashboard", get(echo_identity))
            .route("/api/auth/login", get(ok))
            .route("/api/payments/checkout", get(ok))
            .route("/api/ping", get(ok))
            .route("/api/cron/purge", get(ok))
            .route("/assets/app.js", get(ok))
            .route("/booking", get(echo_tenant))
            .layer(middleware::from_fn_with_state(state.clone(), request_gate))
            .with_state(state.clone());
        (router, state)
    }

    fn app(configure: impl FnOnce(&mut Config)) -> Router {
        app_with(Arc::new(MockDb::new()), configure).0
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn admin_api_without_token_is_unauthorized() {
        let response = app(|_| {}).oneshot(get_req("/api/admin/whoami")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({"success": false, "error": "unauthorized"}));
    }

    #[tokio::test]
    async fn admin_page_without_token_redirects_to_login() {
        let response = app(|_| {})
            .oneshot(get_req("/admin/dashboard?tab=week"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?redirect=%2Fadmin%2Fdashboard%3Ftab%3Dweek"
        );
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_with_identity() {
        let db = Arc::new(MockDb::new());
        let (router, state) = app_with(db, |_| {});
        let org_id = uuid::Uuid::new_v4();
        let user_id = uuid::Uuid::new_v4();
        let issued = state
            .tokens
            .issue(user_id, UserRole::Staff, Some(org_id))
            .unwrap();

        let request = Request::builder()
            .uri("/api/admin/whoami")
            .header(header::AUTHORIZATION, format!("Bearer {}", issued.token))
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&X_RATELIMIT_LIMIT], "10");
        assert_eq!(body_json(response).await["userId"], json!(user_id));
    }

    #[tokio::test]
    async fn tampered_token_is_rejected_without_reason() {
        let response = app(|_| {})
            .oneshot(
                Request::builder()
                    .uri("/api/admin/whoami")
                    .header(header::COOKIE, "auth-token=not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body.get("message").is_none());
    }

    #[tokio::test]
    async fn eleventh_api_request_gets_429_with_headers() {
        let router = app(|_| {});
        for _ in 0..10 {
            let response = router.clone().oneshot(get_req("/api/ping")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router.oneshot(get_req("/api/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[&X_RATELIMIT_LIMIT], "10");
        assert_eq!(headers[&X_RATELIMIT_REMAINING], "0");
        assert!(headers.contains_key(&X_RATELIMIT_RESET));
        let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=10).contains(&retry_after));

        let body = body_json(response).await;
        assert_eq!(body["error"], "too_many_requests");
        assert_eq!(body["retryAfter"], json!(retry_after));
    }

    #[tokio::test]
    async fn strict_routes_share_one_budget() {
        let router = app(|config| {
            config.rate_limit.strict = RateLimitPolicy::new(5, 3600);
        });
        for _ in 0..3 {
            let response = router.clone().oneshot(get_req("/api/auth/login")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(get_req("/api/payments/checkout"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let sixth = router
            .clone()
            .oneshot(get_req("/api/payments/checkout"))
            .await
            .unwrap();
        assert_eq!(sixth.status(), StatusCode::TOO_MANY_REQUESTS);

        let standard = router.oneshot(get_req("/api/ping")).await.unwrap();
        assert_eq!(standard.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn pages_are_not_rate_limited() {
        let router = app(|config| {
            config.rate_limit.standard = RateLimitPolicy::new(1, 3600);
        });
        for _ in 0..3 {
            let response = router.clone().oneshot(get_req("/booking")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(&X_RATELIMIT_LIMIT).is_none());
        }
    }

    #[tokio::test]
    async fn site_gate_locks_pages_and_api() {
        let router = app(|config| {
            config.site_password = Some("preview".into());
        });

        let page = router.clone().oneshot(get_req("/booking?d=1")).await.unwrap();
        assert_eq!(page.status(), StatusCode::FOUND);
        assert_eq!(
            page.headers()[header::LOCATION],
            "/site-access?redirect=%2Fbooking%3Fd%3D1"
        );

        let api = router.clone().oneshot(get_req("/api/ping")).await.unwrap();
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(api).await["error"], "site_locked");

        let cron = router.clone().oneshot(get_req("/api/cron/purge")).await.unwrap();
        assert_eq!(cron.status(), StatusCode::OK);

        let asset = router.clone().oneshot(get_req("/assets/app.js")).await.unwrap();
        assert_eq!(asset.status(), StatusCode::OK);

        let unlocked = Request::builder()
            .uri("/booking")
            .header(
                header::COOKIE,
                format!("site-access={}", site_access::access_token("preview")),
            )
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(unlocked).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_is_checked_before_site_gate_and_identity() {
        let router = app(|config| {
            config.rate_limit.standard = RateLimitPolicy::new(1, 3600);
        });
        let first = router.clone().oneshot(get_req("/api/admin/whoami")).await.unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        let second = router.oneshot(get_req("/api/admin/whoami")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        let locked = app(|config| {
            config.rate_limit.standard = RateLimitPolicy::new(1, 3600);
            config.site_password = Some("preview".into());
        });
        let first = locked.clone().oneshot(get_req("/api/admin/whoami")).await.unwrap();
        assert_eq!(body_json(first).await["error"], "site_locked");
        let second = locked.oneshot(get_req("/api/admin/whoami")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn site_gate_is_checked_before_identity() {
        let router = app(|config| {
            config.site_password = Some("preview".into());
        });

        let locked = router
            .clone()
            .oneshot(get_req("/admin/dashboard"))
            .await
            .unwrap();
        assert_eq!(locked.status(), StatusCode::FOUND);
        assert_eq!(
            locked.headers()[header::LOCATION],
            "/site-access?redirect=%2Fadmin%2Fdashboard"
        );

        let unlocked = Request::builder()
            .uri("/admin/dashboard")
            .header(
                header::COOKIE,
                format!("site-access={}", site_access::access_token("preview")),
            )
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(unlocked).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?redirect=%2Fadmin%2Fdashboard"
        );
    }

    #[tokio::test]
    async fn pages_carry_the_resolved_tenant() {
        let db = Arc::new(
            MockDb::new()
                .with_organization(sample_organization("belle", PlanTier::Team))
                .with_organization(sample_organization("laia", PlanTier::Premium)),
        );
        let (router, _) = app_with(db, |config| {
            config.tenant.default_slug = Some("laia".into());
        });

        let request = Request::builder()
            .uri("/booking")
            .header(header::HOST, "belle.example.com")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await["tenant"], "belle");

        let request = Request::builder()
            .uri("/booking")
            .header(header::HOST, "unknown.tld")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await["tenant"], "laia");
    }
}
