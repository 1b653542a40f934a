use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::debug;

use crate::{
    gate::request_host,
    models::{organization::OrganizationBranding, plan::PlanTier},
    responses::JsonResponse,
    services::tenant::{ResolutionSource, TenantError},
    state::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantBrandingResponse {
    pub resolved: bool,
    pub source: Option<ResolutionSource>,
    pub organization: OrganizationBranding,
}

/// Branding shown when no organization serves the host.
pub fn default_branding() -> OrganizationBranding {
    OrganizationBranding {
        slug: "default".into(),
        name: "TenantGate".into(),
        subdomain: "www".into(),
        domain: None,
        plan: PlanTier::Solo,
        features: Vec::new(),
    }
}

/// Public branding for the requesting host. Never fails: an unresolved host
/// gets the built-in branding.
pub async fn current_branding(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let resolution = state.tenants.resolve(&request_host(&headers)).await;
    let body = match resolution.organization() {
        Some(organization) => TenantBrandingResponse {
            resolved: true,
            source: resolution.source(),
            organization: OrganizationBranding::from(organization),
        },
        None => TenantBrandingResponse {
            resolved: false,
            source: None,
            organization: default_branding(),
        },
    };
    Json(body).into_response()
}

/// Tenant data for protected pages: unknown hosts and inactive organizations
/// are refused.
pub async fn require_tenant(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let host = request_host(&headers);
    match state.tenants.require(&host).await {
        Ok(organization) => Json(OrganizationBranding::from(&organization)).into_response(),
        Err(TenantError::NotFound) => JsonResponse::not_found(),
        Err(TenantError::Inactive(status)) => {
            debug!(%host, ?status, "inactive organization requested");
            JsonResponse::forbidden_with_message("Organization is not active")
        }
    }
}
