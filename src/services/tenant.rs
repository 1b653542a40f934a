//! Maps the Host of an inbound request to an organization.
//!
//! Tiers are tried strictly in order and each is awaited before the next:
//! development host, custom domain, subdomain, configured default. A store
//! failure stops the chain with [`TenantResolution::Unresolved`].

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    db::organization_repository::OrganizationRepository,
    models::organization::{Organization, OrganizationStatus},
};

const BUILTIN_DEV_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", "0.0.0.0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionSource {
    DevelopmentHost,
    CustomDomain,
    Subdomain,
    Default,
}

#[derive(Debug, Clone)]
pub enum TenantResolution {
    Matched {
        organization: Organization,
        via: ResolutionSource,
    },
    Unresolved,
}

impl TenantResolution {
    pub fn organization(&self) -> Option<&Organization> {
        match self {
            TenantResolution::Matched { organization, .. } => Some(organization),
            TenantResolution::Unresolved => None,
        }
    }

    pub fn source(&self) -> Option<ResolutionSource> {
        match self {
            TenantResolution::Matched { via, .. } => Some(*via),
            TenantResolution::Unresolved => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("no organization serves this host")]
    NotFound,
    #[error("organization is {0:?}")]
    Inactive(OrganizationStatus),
}

#[derive(Debug, Clone, Default)]
pub struct TenantSettings {
    pub default_slug: Option<String>,
    /// Extra hosts treated as development hosts, on top of the loopback names.
    pub dev_hosts: Vec<String>,
    /// Off in production unless explicitly opted in.
    pub dev_hosts_enabled: bool,
}

#[derive(Clone)]
pub struct TenantResolver {
    organizations: Arc<dyn OrganizationRepository>,
    settings: TenantSettings,
}

impl TenantResolver {
    pub fn new(organizations: Arc<dyn OrganizationRepository>, settings: TenantSettings) -> Self {
        Self {
            organizations,
            settings,
        }
    }

    pub async fn resolve(&self, host: &str) -> TenantResolution {
        let Some(host) = normalize_host(host) else {
            return self.resolve_default(ResolutionSource::Default).await;
        };

        if self.is_dev_host(&host) {
            debug!(%host, "development host, using default organization");
            return self
                .resolve_default(ResolutionSource::DevelopmentHost)
                .await;
        }

        for candidate in domain_candidates(&host) {
            match self.organizations.find_by_domain(candidate).await {
                Ok(Some(organization)) => {
                    return TenantResolution::Matched {
                        organization,
                        via: ResolutionSource::CustomDomain,
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    error!(?err, %host, "custom domain lookup failed");
                    return TenantResolution::Unresolved;
                }
            }
        }

        if let Some(label) = subdomain_label(&host) {
            match self.organizations.find_by_subdomain(label).await {
                Ok(Some(organization)) => {
                    return TenantResolution::Matched {
                        organization,
                        via: ResolutionSource::Subdomain,
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    error!(?err, %host, "subdomain lookup failed");
                    return TenantResolution::Unresolved;
                }
            }
        }

        self.resolve_default(ResolutionSource::Default).await
    }

    /// Resolution for protected tenant data: a miss is fatal and only
    /// operational organizations are served.
    pub async fn require(&self, host: &str) -> Result<Organization, TenantError> {
        match self.resolve(host).await {
            TenantResolution::Matched { organization, .. } => {
                if organization.status.is_operational() {
                    Ok(organization)
                } else {
                    Err(TenantError::Inactive(organization.status))
                }
            }
            TenantResolution::Unresolved => Err(TenantError::NotFound),
        }
    }

    fn is_dev_host(&self, host: &str) -> bool {
        if !self.settings.dev_hosts_enabled {
            return false;
        }
        BUILTIN_DEV_HOSTS.contains(&host)
            || self
                .settings
                .dev_hosts
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(host))
    }

    async fn resolve_default(&self, via: ResolutionSource) -> TenantResolution {
        match self.find_default().await {
            Some(organization) => TenantResolution::Matched { organization, via },
            None => TenantResolution::Unresolved,
        }
    }

    /// The configured default organization. Store errors are logged and read
    /// as a miss.
    async fn find_default(&self) -> Option<Organization> {
        let slug = self.settings.default_slug.as_deref()?;
        self.organizations
            .find_by_slug(slug)
            .await
            .unwrap_or_else(|err| {
                error!(?err, %slug, "default organization lookup failed");
                None
            })
    }
}

/// Lowercases and strips the port and any trailing dot. IPv6 literals keep
/// their brackets.
pub fn normalize_host(raw: &str) -> Option<String> {
    let host = raw.trim().to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }

    let host = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => host[..=end].to_string(),
            None => return None,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
            _ => host,
        }
    };

    let host = host.trim_end_matches('.').to_string();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn domain_candidates(host: &str) -> Vec<&str> {
    match host.strip_prefix("www.") {
        Some(bare) if !bare.is_empty() => vec![host, bare],
        _ => vec![host],
    }
}

/// Leftmost label of `host` once a leading `www.` is removed, when the rest
/// has at least three labels or is `<label>.localhost`.
pub fn subdomain_label(host: &str) -> Option<&str> {
    let bare = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = bare.split('.').collect();
    if labels.iter().any(|label| label.is_empty()) {
        return None;
    }

    let qualifies =
        labels.len() >= 3 || (labels.len() == 2 && labels[1] == "localhost");
    if qualifies {
        labels.first().copied()
    } else {
        None
    }
}
