//! Role-based access: one table of which roles may call which route
//! categories, plus the organization-scope check applied at the data boundary.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::{models::user::UserRole, routes::auth::claims::IdentityContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteCategory {
    AdminRead,
    AdminWrite,
    UserManagement,
    LocationManagement,
    FrontDesk,
    Accounting,
    BillingManagement,
    ClientSelfService,
    SuperAdminOnly,
}

impl RouteCategory {
    pub const ALL: [RouteCategory; 9] = [
        RouteCategory::AdminRead,
        RouteCategory::AdminWrite,
        RouteCategory::UserManagement,
        RouteCategory::LocationManagement,
        RouteCategory::FrontDesk,
        RouteCategory::Accounting,
        RouteCategory::BillingManagement,
        RouteCategory::ClientSelfService,
        RouteCategory::SuperAdminOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteCategory::AdminRead => "admin-read",
            RouteCategory::AdminWrite => "admin-write",
            RouteCategory::UserManagement => "user-management",
            RouteCategory::LocationManagement => "location-management",
            RouteCategory::FrontDesk => "front-desk",
            RouteCategory::Accounting => "accounting",
            RouteCategory::BillingManagement => "billing-management",
            RouteCategory::ClientSelfService => "client-self-service",
            RouteCategory::SuperAdminOnly => "super-admin-only",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("role {role} may not call {category:?} routes")]
    RoleNotPermitted {
        role: UserRole,
        category: RouteCategory,
    },
    #[error("identity scoped to organization {caller:?} cannot access organization {resource}")]
    OrganizationMismatch { caller: Option<Uuid>, resource: Uuid },
}

/// Which roles may call which route categories. SUPER_ADMIN is implicitly
/// allowed everywhere and is never listed.
#[derive(Debug, Clone)]
pub struct RoleMatrix {
    table: HashMap<RouteCategory, HashSet<UserRole>>,
}

impl RoleMatrix {
    pub fn standard() -> Self {
        use RouteCategory::*;
        use UserRole::*;

        let rows: [(RouteCategory, &[UserRole]); 9] = [
            (
                AdminRead,
                &[OrgAdmin, LocationManager, Staff, Receptionist, Accountant],
            ),
            (AdminWrite, &[OrgAdmin]),
            (UserManagement, &[OrgAdmin]),
            (LocationManagement, &[OrgAdmin, LocationManager]),
            (FrontDesk, &[OrgAdmin, LocationManager, Staff, Receptionist]),
            (Accounting, &[OrgAdmin, Accountant]),
            (BillingManagement, &[OrgAdmin]),
            (
                ClientSelfService,
                &[
                    OrgAdmin,
                    LocationManager,
                    Staff,
                    Receptionist,
                    Accountant,
                    Client,
                ],
            ),
            (SuperAdminOnly, &[]),
        ];

        Self::from_rows(rows)
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = (RouteCategory, &'a [UserRole])>) -> Self {
        let mut table: HashMap<RouteCategory, HashSet<UserRole>> = RouteCategory::ALL
            .iter()
            .map(|category| (*category, HashSet::new()))
            .collect();
        for (category, roles) in rows {
            table
                .entry(category)
                .or_default()
                .extend(roles.iter().copied());
        }
        Self { table }
    }

    pub fn is_allowed(&self, role: UserRole, category: RouteCategory) -> bool {
        if role.is_super_admin() {
            return true;
        }
        self.table
            .get(&category)
            .is_some_and(|roles| roles.contains(&role))
    }

    pub fn allowed_roles(&self, category: RouteCategory) -> Vec<UserRole> {
        UserRole::ALL
            .iter()
            .copied()
            .filter(|role| self.is_allowed(*role, category))
            .collect()
    }

    pub fn check_role(
        &self,
        identity: &IdentityContext,
        category: RouteCategory,
    ) -> Result<(), AccessError> {
        if self.is_allowed(identity.role, category) {
            Ok(())
        } else {
            Err(AccessError::RoleNotPermitted {
                role: identity.role,
                category,
            })
        }
    }

    /// Role check followed by the organization-scope check. Passing the first
    /// never implies passing the second.
    pub fn authorize(
        &self,
        identity: &IdentityContext,
        category: RouteCategory,
        resource_organization: Option<Uuid>,
    ) -> Result<(), AccessError> {
        self.check_role(identity, category)?;
        if let Some(resource) = resource_organization {
            ensure_organization_scope(identity, resource)?;
        }
        Ok(())
    }
}

impl Default for RoleMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

/// Must run on every read and write of tenant data for non-SUPER_ADMIN callers.
pub fn ensure_organization_scope(
    identity: &IdentityContext,
    resource_organization: Uuid,
) -> Result<(), AccessError> {
    if identity.is_super_admin() {
        return Ok(());
    }

    if identity.organization_id == Some(resource_organization) {
        return Ok(());
    }

    error!(
        user_id = %identity.user_id,
        role = %identity.role,
        caller_org = ?identity.organization_id,
        resource_org = %resource_organization,
        "cross-tenant access attempt blocked"
    );
    Err(AccessError::OrganizationMismatch {
        caller: identity.organization_id,
        resource: resource_organization,
    })
}
