use core::fmt;

use serde::{Deserialize, Serialize};

const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Solo,
    Duo,
    Team,
    Premium,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Solo,
        PlanTier::Duo,
        PlanTier::Team,
        PlanTier::Premium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Solo => "SOLO",
            PlanTier::Duo => "DUO",
            PlanTier::Team => "TEAM",
            PlanTier::Premium => "PREMIUM",
        }
    }

    /// Parses a stored plan name. Legacy plan names map onto the current tiers.
    pub fn from_stored(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        let key = normalized
            .split([':', '-', '_', ' ', '/', '.'])
            .next()
            .unwrap_or(normalized.as_str());

        match key {
            "SOLO" | "STARTER" => Some(PlanTier::Solo),
            "DUO" | "ESSENTIAL" => Some(PlanTier::Duo),
            "TEAM" | "PROFESSIONAL" => Some(PlanTier::Team),
            "PREMIUM" | "ENTERPRISE" => Some(PlanTier::Premium),
            _ => None,
        }
    }

    pub fn definition(self) -> PlanDefinition {
        use FeatureKey::*;
        match self {
            PlanTier::Solo => PlanDefinition {
                tier: self,
                max_users: Limit::Limited(1),
                max_locations: Limit::Limited(1),
                max_storage_gb: Limit::Limited(5),
                features: &[],
            },
            PlanTier::Duo => PlanDefinition {
                tier: self,
                max_users: Limit::Limited(3),
                max_locations: Limit::Limited(1),
                max_storage_gb: Limit::Limited(15),
                features: &[Crm, Emailing, MultiUser],
            },
            PlanTier::Team => PlanDefinition {
                tier: self,
                max_users: Limit::Limited(8),
                max_locations: Limit::Limited(3),
                max_storage_gb: Limit::Limited(30),
                features: &[
                    Crm,
                    Emailing,
                    Blog,
                    Shop,
                    WhatsApp,
                    Sms,
                    SocialMedia,
                    MultiLocation,
                    MultiUser,
                ],
            },
            PlanTier::Premium => PlanDefinition {
                tier: self,
                max_users: Limit::Unlimited,
                max_locations: Limit::Unlimited,
                max_storage_gb: Limit::Unlimited,
                features: &FeatureKey::ALL,
            },
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric ceiling, or no ceiling at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Limit {
    Limited(u64),
    Unlimited,
}

/// Quota and feature template for one plan tier. Built by [`PlanTier::definition`],
/// so every tier has exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDefinition {
    pub tier: PlanTier,
    pub max_users: Limit,
    pub max_locations: Limit,
    pub max_storage_gb: Limit,
    pub features: &'static [FeatureKey],
}

impl PlanDefinition {
    pub fn max_storage_bytes(&self) -> Limit {
        match self.max_storage_gb {
            Limit::Limited(gb) => Limit::Limited(gb.saturating_mul(BYTES_PER_GB)),
            Limit::Unlimited => Limit::Unlimited,
        }
    }

    pub fn includes(&self, feature: FeatureKey) -> bool {
        self.features.contains(&feature)
    }
}

pub fn gb_to_bytes(gb: u64) -> u64 {
    gb.saturating_mul(BYTES_PER_GB)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    Blog,
    Crm,
    Emailing,
    Shop,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    Sms,
    SocialMedia,
    Stock,
    MultiLocation,
    MultiUser,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 10] = [
        FeatureKey::Blog,
        FeatureKey::Crm,
        FeatureKey::Emailing,
        FeatureKey::Shop,
        FeatureKey::WhatsApp,
        FeatureKey::Sms,
        FeatureKey::SocialMedia,
        FeatureKey::Stock,
        FeatureKey::MultiLocation,
        FeatureKey::MultiUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Blog => "blog",
            FeatureKey::Crm => "crm",
            FeatureKey::Emailing => "emailing",
            FeatureKey::Shop => "shop",
            FeatureKey::WhatsApp => "whatsapp",
            FeatureKey::Sms => "sms",
            FeatureKey::SocialMedia => "social_media",
            FeatureKey::Stock => "stock",
            FeatureKey::MultiLocation => "multi_location",
            FeatureKey::MultiUser => "multi_user",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == normalized)
    }

    /// Recurring add-on that unlocks this feature outside of its plan.
    pub fn from_addon(addon_id: &str) -> Option<Self> {
        match addon_id.trim() {
            "feature-blog" => Some(FeatureKey::Blog),
            "feature-crm" => Some(FeatureKey::Crm),
            "feature-emailing" => Some(FeatureKey::Emailing),
            "feature-shop" => Some(FeatureKey::Shop),
            "feature-whatsapp" => Some(FeatureKey::WhatsApp),
            "feature-sms" => Some(FeatureKey::Sms),
            "feature-social-media" => Some(FeatureKey::SocialMedia),
            "feature-stock" => Some(FeatureKey::Stock),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
