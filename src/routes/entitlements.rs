use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    models::plan::FeatureKey,
    responses::JsonResponse,
    routes::auth::session::AuthSession,
    services::{
        access::{AccessError, RouteCategory},
        entitlements::{EntitlementError, QuotaKind},
    },
    state::AppState,
};

fn access_denied(err: AccessError) -> Response {
    warn!(%err, "entitlement route refused");
    JsonResponse::forbidden()
}

fn entitlement_failure(err: EntitlementError) -> Response {
    match err {
        EntitlementError::OrganizationNotFound(_) => JsonResponse::not_found(),
        EntitlementError::Store(_) => JsonResponse::server_error("Entitlements unavailable"),
    }
}

/// Usage summary of the caller's own organization.
pub async fn own_usage_summary(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
) -> Response {
    if let Err(err) = state.roles.check_role(&identity, RouteCategory::AdminRead) {
        return access_denied(err);
    }
    let Some(organization_id) = identity.organization_id else {
        return JsonResponse::bad_request("No organization in session");
    };

    match state.entitlements.usage_summary(organization_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => entitlement_failure(err),
    }
}

pub async fn organization_quota(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path((organization_id, kind)): Path<(Uuid, String)>,
) -> Response {
    let Some(kind) = QuotaKind::parse(&kind) else {
        return JsonResponse::not_found();
    };
    if let Err(err) = state
        .roles
        .authorize(&identity, RouteCategory::AdminRead, Some(organization_id))
    {
        return access_denied(err);
    }

    match state.entitlements.check_quota(organization_id, kind).await {
        Ok(decision) => Json(decision).into_response(),
        Err(err) => entitlement_failure(err),
    }
}

pub async fn organization_feature(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path((organization_id, feature)): Path<(Uuid, String)>,
) -> Response {
    let Some(feature) = FeatureKey::parse(&feature) else {
        return JsonResponse::not_found();
    };
    if let Err(err) = state
        .roles
        .authorize(&identity, RouteCategory::AdminRead, Some(organization_id))
    {
        return access_denied(err);
    }

    match state.entitlements.has_feature(organization_id, feature).await {
        Ok(enabled) => Json(json!({ "feature": feature, "enabled": enabled })).into_response(),
        Err(err) => entitlement_failure(err),
    }
}

/// Platform view of any organization's usage.
pub async fn any_organization_usage(
    State(state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(organization_id): Path<Uuid>,
) -> Response {
    if let Err(err) = state
        .roles
        .check_role(&identity, RouteCategory::SuperAdminOnly)
    {
        return access_denied(err);
    }

    match state.entitlements.usage_summary(organization_id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(err) => entitlement_failure(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        routing::get,
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        db::mock_db::{sample_organization, MockDb},
        models::{plan::PlanTier, user::UserRole},
        state::test_support::test_state,
    };

    struct Fixture {
        app: Router,
        state: AppState,
        db: Arc<MockDb>,
        org_a: Uuid,
        org_b: Uuid,
    }

    fn fixture() -> Fixture {
        let a = sample_organization("alpha", PlanTier::Solo);
        let b = sample_organization("beta", PlanTier::Team);
        let (org_a, org_b) = (a.id, b.id);
        let db = Arc::new(MockDb::new().with_organization(a).with_organization(b));
        let state = test_state(db.clone(), |_| {});
        let app = Router::new()
            .route("/api/admin/entitlements", get(own_usage_summary))
            .route(
                "/api/admin/organizations/{organization_id}/quotas/{kind}",
                get(organization_quota),
            )
            .route(
                "/api/admin/organizations/{organization_id}/features/{feature}",
                get(organization_feature),
            )
            .route(
                "/api/super-admin/organizations/{organization_id}/entitlements",
                get(any_organization_usage),
            )
            .with_state(state.clone());
        Fixture {
            app,
            state,
            db,
            org_a,
            org_b,
        }
    }

    fn token(state: &AppState, role: UserRole, org: Option<Uuid>) -> String {
        state.tokens.issue(Uuid::new_v4(), role, org).unwrap().token
    }

    async fn call(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_quota_reflects_plan_change_without_new_token() {
        let f = fixture();
        f.db.add_user(Some(f.org_a), UserRole::OrgAdmin);
        let admin = token(&f.state, UserRole::OrgAdmin, Some(f.org_a));
        let uri = format!("/api/admin/organizations/{}/quotas/users", f.org_a);

        let (status, body) = call(&f.app, &uri, &admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allowed"], false);
        assert_eq!(body["currentCount"], 1);
        assert!(body["message"].is_string());

        f.db.change_plan(f.org_a, PlanTier::Duo);
        let (_, body) = call(&f.app, &uri, &admin).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["limit"], 3);
    }

    #[tokio::test]
    async fn test_staff_of_one_org_cannot_read_another() {
        let f = fixture();
        let staff_a = token(&f.state, UserRole::Staff, Some(f.org_a));

        let own = format!("/api/admin/organizations/{}/features/crm", f.org_a);
        let (status, body) = call(&f.app, &own, &staff_a).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["enabled"], false);

        let foreign = format!("/api/admin/organizations/{}/features/shop", f.org_b);
        let (status, body) = call(&f.app, &foreign, &staff_a).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    #[tokio::test]
    async fn test_client_role_is_refused_admin_read() {
        let f = fixture();
        let client = token(&f.state, UserRole::Client, Some(f.org_a));
        let (status, _) = call(&f.app, "/api/admin/entitlements", &client).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_own_usage_summary() {
        let f = fixture();
        let accountant = token(&f.state, UserRole::Accountant, Some(f.org_b));
        let (status, body) = call(&f.app, "/api/admin/entitlements", &accountant).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"], "TEAM");
        assert_eq!(body["locations"]["limit"], 3);
        assert!(body["features"]
            .as_array()
            .unwrap()
            .contains(&Value::from("shop")));
    }

    #[tokio::test]
    async fn test_super_admin_route_requires_super_admin() {
        let f = fixture();
        let uri = format!("/api/super-admin/organizations/{}/entitlements", f.org_b);

        let org_admin = token(&f.state, UserRole::OrgAdmin, Some(f.org_b));
        let (status, _) = call(&f.app, &uri, &org_admin).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let super_admin = token(&f.state, UserRole::SuperAdmin, None);
        let (status, body) = call(&f.app, &uri, &super_admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["organizationId"], json!(f.org_b));

        let missing = format!("/api/super-admin/organizations/{}/entitlements", Uuid::new_v4());
        let (status, _) = call(&f.app, &missing, &super_admin).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let f = fixture();
        let admin = token(&f.state, UserRole::OrgAdmin, Some(f.org_a));
        f.db.set_failing(true);
        let uri = format!("/api/admin/organizations/{}/quotas/storage", f.org_a);
        let (status, _) = call(&f.app, &uri, &admin).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_quota_kind_is_not_found() {
        let f = fixture();
        let admin = token(&f.state, UserRole::OrgAdmin, Some(f.org_a));
        let uri = format!("/api/admin/organizations/{}/quotas/seats", f.org_a);
        let (status, _) = call(&f.app, &uri, &admin).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
