use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    gate::{
        request_gate,
        site_access::{submit_site_access, SITE_ACCESS_PATH},
    },
    responses::JsonResponse,
    routes::{
        auth::{handle_login, handle_logout, handle_me},
        cron::purge_rate_limits,
        entitlements::{
            any_organization_usage, organization_feature, organization_quota, own_usage_summary,
        },
        tenant::{current_branding, require_tenant},
    },
    state::AppState,
};

/// The full application router with the request gate in front of every route.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(handle_login))
        .route("/logout", post(handle_logout))
        .route("/me", get(handle_me));

    let admin_routes = Router::new()
        .route("/entitlements", get(own_usage_summary))
        .route(
            "/organizations/{organization_id}/quotas/{kind}",
            get(organization_quota),
        )
        .route(
            "/organizations/{organization_id}/features/{feature}",
            get(organization_feature),
        );

    let super_admin_routes = Router::new().route(
        "/organizations/{organization_id}/entitlements",
        get(any_organization_usage),
    );

    let cron_routes = Router::new().route("/purge-rate-limits", post(purge_rate_limits));

    let app = Router::new()
        .route("/", get(root))
        .route(SITE_ACCESS_PATH, post(submit_site_access))
        .route("/api/tenant", get(current_branding))
        .route("/api/tenant/current", get(require_tenant))
        .nest("/api/auth", auth_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/super-admin", super_admin_routes)
        .nest("/api/cron", cron_routes)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), request_gate))
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    match cors_layer(&state) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_layer(state: &AppState) -> Option<CorsLayer> {
    let origin = state.config.frontend_origin.as_deref()?;
    match origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_credentials(true),
        ),
        Err(err) => {
            warn!(?err, %origin, "FRONTEND_ORIGIN is not a valid header value, CORS disabled");
            None
        }
    }
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("TenantGate is running")
}

async fn not_found() -> Response {
    JsonResponse::not_found()
}
