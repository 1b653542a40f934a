use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    db::organization_repository::OrganizationRepository,
    models::{
        organization::Organization,
        plan::{FeatureKey, Limit, PlanTier},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaKind {
    Users,
    Locations,
    Storage,
}

impl QuotaKind {
    pub const ALL: [QuotaKind; 3] = [QuotaKind::Users, QuotaKind::Locations, QuotaKind::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Users => "users",
            QuotaKind::Locations => "locations",
            QuotaKind::Storage => "storage",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        QuotaKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaDecision {
    pub allowed: bool,
    pub current_count: u64,
    /// `None` means no ceiling.
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QuotaDecision {
    fn evaluate(kind: QuotaKind, plan: PlanTier, current_count: u64, limit: Limit) -> Self {
        match limit {
            Limit::Unlimited => QuotaDecision {
                allowed: true,
                current_count,
                limit: None,
                remaining: None,
                message: None,
            },
            Limit::Limited(max) => {
                let allowed = current_count < max;
                let message = (!allowed).then(|| denial_message(kind, plan, max));
                QuotaDecision {
                    allowed,
                    current_count,
                    limit: Some(max),
                    remaining: Some(max.saturating_sub(current_count)),
                    message,
                }
            }
        }
    }
}

fn denial_message(kind: QuotaKind, plan: PlanTier, max: u64) -> String {
    match kind {
        QuotaKind::Users => format!(
            "The {plan} plan allows {max} team member(s). Upgrade to add more users."
        ),
        QuotaKind::Locations => format!(
            "The {plan} plan allows {max} location(s). Upgrade to add more locations."
        ),
        QuotaKind::Storage => format!(
            "Storage limit of {} GB reached on the {plan} plan.",
            max / (1024 * 1024 * 1024)
        ),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub organization_id: Uuid,
    pub plan: PlanTier,
    pub users: QuotaDecision,
    pub locations: QuotaDecision,
    pub storage: QuotaDecision,
    pub features: Vec<FeatureKey>,
}

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("organization {0} not found")]
    OrganizationNotFound(Uuid),
    #[error("entitlement store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

/// Quota and feature checks against the organization's current plan. Every
/// call reads the organization and the live count, so a plan change applies
/// to the next request.
#[derive(Clone)]
pub struct EntitlementGuard {
    organizations: Arc<dyn OrganizationRepository>,
}

impl EntitlementGuard {
    pub fn new(organizations: Arc<dyn OrganizationRepository>) -> Self {
        Self { organizations }
    }

    pub async fn check_quota(
        &self,
        organization_id: Uuid,
        kind: QuotaKind,
    ) -> Result<QuotaDecision, EntitlementError> {
        let organization = self.load(organization_id).await?;
        self.decide(&organization, kind).await
    }

    pub async fn has_feature(
        &self,
        organization_id: Uuid,
        feature: FeatureKey,
    ) -> Result<bool, EntitlementError> {
        let organization = self
            .organizations
            .find_by_id(organization_id)
            .await
            .map_err(|err| {
                error!(?err, %organization_id, "feature lookup failed");
                EntitlementError::Store(err)
            })?;

        Ok(organization.is_some_and(|org| org.features.enabled(feature)))
    }

    pub async fn usage_summary(
        &self,
        organization_id: Uuid,
    ) -> Result<UsageSummary, EntitlementError> {
        let organization = self.load(organization_id).await?;
        let users = self.decide(&organization, QuotaKind::Users).await?;
        let locations = self.decide(&organization, QuotaKind::Locations).await?;
        let storage = self.decide(&organization, QuotaKind::Storage).await?;

        Ok(UsageSummary {
            organization_id,
            plan: organization.plan,
            users,
            locations,
            storage,
            features: organization.features.enabled_keys(),
        })
    }

    async fn load(&self, organization_id: Uuid) -> Result<Organization, EntitlementError> {
        match self.organizations.find_by_id(organization_id).await {
            Ok(Some(organization)) => Ok(organization),
            Ok(None) => Err(EntitlementError::OrganizationNotFound(organization_id)),
            Err(err) => {
                error!(?err, %organization_id, "organization lookup failed");
                Err(EntitlementError::Store(err))
            }
        }
    }

    async fn decide(
        &self,
        organization: &Organization,
        kind: QuotaKind,
    ) -> Result<QuotaDecision, EntitlementError> {
        let (count, limit) = match kind {
            QuotaKind::Users => (
                self.organizations.count_member_users(organization.id).await,
                organization.user_limit(),
            ),
            QuotaKind::Locations => (
                self.organizations.count_locations(organization.id).await,
                organization.location_limit(),
            ),
            QuotaKind::Storage => (
                self.organizations.storage_bytes_used(organization.id).await,
                organization.storage_limit_bytes(),
            ),
        };

        let count = count.map_err(|err| {
            error!(
                ?err,
                organization_id = %organization.id,
                kind = kind.as_str(),
                "usage count failed"
            );
            EntitlementError::Store(err)
        })?;

        let decision = QuotaDecision::evaluate(kind, organization.plan, count, limit);
        debug!(
            organization_id = %organization.id,
            kind = kind.as_str(),
            allowed = decision.allowed,
            current = decision.current_count,
            "quota checked"
        );
        Ok(decision)
    }
}
