use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::plan::{gb_to_bytes, FeatureKey, Limit, PlanTier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationStatus {
    Trial,
    Active,
    Suspended,
    Cancelled,
}

impl OrganizationStatus {
    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRIAL" => Some(OrganizationStatus::Trial),
            "ACTIVE" => Some(OrganizationStatus::Active),
            "SUSPENDED" => Some(OrganizationStatus::Suspended),
            "CANCELLED" | "CANCELED" => Some(OrganizationStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether tenant data may be served for an organization in this state.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            OrganizationStatus::Trial | OrganizationStatus::Active
        )
    }
}

/// Feature flags denormalized onto the organization row when its plan changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationFeatures {
    pub blog: bool,
    pub crm: bool,
    pub emailing: bool,
    pub shop: bool,
    pub whatsapp: bool,
    pub sms: bool,
    pub social_media: bool,
    pub stock: bool,
    pub multi_location: bool,
    pub multi_user: bool,
}

impl OrganizationFeatures {
    /// Flags to persist for `plan`, with recurring add-ons switched on on top.
    /// Unknown add-on ids are ignored.
    pub fn for_plan<S: AsRef<str>>(plan: PlanTier, addons: &[S]) -> Self {
        let definition = plan.definition();
        let mut features = Self::default();
        for key in definition.features {
            features.set(*key, true);
        }
        for addon in addons {
            if let Some(key) = FeatureKey::from_addon(addon.as_ref()) {
                features.set(key, true);
            }
        }
        features
    }

    pub fn enabled(&self, key: FeatureKey) -> bool {
        match key {
            FeatureKey::Blog => self.blog,
            FeatureKey::Crm => self.crm,
            FeatureKey::Emailing => self.emailing,
            FeatureKey::Shop => self.shop,
            FeatureKey::WhatsApp => self.whatsapp,
            FeatureKey::Sms => self.sms,
            FeatureKey::SocialMedia => self.social_media,
            FeatureKey::Stock => self.stock,
            FeatureKey::MultiLocation => self.multi_location,
            FeatureKey::MultiUser => self.multi_user,
        }
    }

    pub fn set(&mut self, key: FeatureKey, value: bool) {
        let slot = match key {
            FeatureKey::Blog => &mut self.blog,
            FeatureKey::Crm => &mut self.crm,
            FeatureKey::Emailing => &mut self.emailing,
            FeatureKey::Shop => &mut self.shop,
            FeatureKey::WhatsApp => &mut self.whatsapp,
            FeatureKey::Sms => &mut self.sms,
            FeatureKey::SocialMedia => &mut self.social_media,
            FeatureKey::Stock => &mut self.stock,
            FeatureKey::MultiLocation => &mut self.multi_location,
            FeatureKey::MultiUser => &mut self.multi_user,
        };
        *slot = value;
    }

    pub fn enabled_keys(&self) -> Vec<FeatureKey> {
        FeatureKey::ALL
            .iter()
            .copied()
            .filter(|key| self.enabled(*key))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    pub domain: Option<String>,
    pub plan: PlanTier,
    pub status: OrganizationStatus,
    /// Per-organization ceilings that replace the plan's when set.
    pub max_users: Option<Limit>,
    pub max_locations: Option<Limit>,
    pub max_storage_gb: Option<Limit>,
    pub features: OrganizationFeatures,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Maps a stored override column: unset or zero defers to the plan, a
/// negative value means no ceiling.
pub fn limit_override(raw: Option<i64>) -> Option<Limit> {
    match raw {
        None | Some(0) => None,
        Some(n) if n < 0 => Some(Limit::Unlimited),
        Some(n) => Some(Limit::Limited(n as u64)),
    }
}

impl Organization {
    pub fn user_limit(&self) -> Limit {
        self.max_users
            .unwrap_or_else(|| self.plan.definition().max_users)
    }

    pub fn location_limit(&self) -> Limit {
        self.max_locations
            .unwrap_or_else(|| self.plan.definition().max_locations)
    }

    pub fn storage_limit_bytes(&self) -> Limit {
        match self.max_storage_gb {
            Some(Limit::Limited(gb)) => Limit::Limited(gb_to_bytes(gb)),
            Some(Limit::Unlimited) => Limit::Unlimited,
            None => self.plan.definition().max_storage_bytes(),
        }
    }
}

/// What a public page may learn about the tenant it is rendered for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationBranding {
    pub slug: String,
    pub name: String,
    pub subdomain: String,
    pub domain: Option<String>,
    pub plan: PlanTier,
    pub features: Vec<FeatureKey>,
}

impl From<&Organization> for OrganizationBranding {
    fn from(org: &Organization) -> Self {
        Self {
            slug: org.slug.clone(),
            name: org.name.clone(),
            subdomain: org.subdomain.clone(),
            domain: org.domain.clone(),
            plan: org.plan,
            features: org.features.enabled_keys(),
        }
    }
}
