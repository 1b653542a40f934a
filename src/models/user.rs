use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical role of a principal. Tokens always carry one of these spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    OrgAdmin,
    LocationManager,
    Staff,
    Receptionist,
    Accountant,
    Client,
}

/// Legacy spellings still found in stored user rows, mapped to their canonical role.
/// Matching is case-insensitive. Anything not listed here (nor a canonical name) is rejected.
/// `COMPTABLE` is read as ACCOUNTANT, the finance-only role those accounts were given.
pub const ROLE_ALIASES: &[(&str, UserRole)] = &[
    ("ADMIN", UserRole::OrgAdmin),
    ("OWNER", UserRole::OrgAdmin),
    ("ORG_OWNER", UserRole::OrgAdmin),
    ("EMPLOYEE", UserRole::Staff),
    ("STAGIAIRE", UserRole::Staff),
    ("ALTERNANT", UserRole::Staff),
    ("COMPTABLE", UserRole::Accountant),
    ("INACTIVE", UserRole::Client),
];

impl UserRole {
    pub const ALL: [UserRole; 7] = [
        UserRole::SuperAdmin,
        UserRole::OrgAdmin,
        UserRole::LocationManager,
        UserRole::Staff,
        UserRole::Receptionist,
        UserRole::Accountant,
        UserRole::Client,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "SUPER_ADMIN",
            UserRole::OrgAdmin => "ORG_ADMIN",
            UserRole::LocationManager => "LOCATION_MANAGER",
            UserRole::Staff => "STAFF",
            UserRole::Receptionist => "RECEPTIONIST",
            UserRole::Accountant => "ACCOUNTANT",
            UserRole::Client => "CLIENT",
        }
    }

    /// Parses a role as stored in the users table, accepting canonical names in
    /// any case and the legacy aliases in [`ROLE_ALIASES`].
    pub fn from_stored(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return None;
        }

        if let Some(role) = Self::ALL.iter().find(|r| r.as_str() == normalized) {
            return Some(*role);
        }

        ROLE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, role)| *role)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }

    /// Roles that count against the plan's user quota.
    pub fn is_member(&self) -> bool {
        !matches!(self, UserRole::Client)
    }
}

/// Every uppercase stored spelling that reads as a member role, for counting
/// seats in SQL the same way [`UserRole::from_stored`] reads a row.
pub fn member_role_spellings() -> Vec<&'static str> {
    UserRole::ALL
        .iter()
        .filter(|role| role.is_member())
        .map(|role| role.as_str())
        .chain(
            ROLE_ALIASES
                .iter()
                .filter(|(_, role)| role.is_member())
                .map(|(alias, _)| *alias),
        )
        .collect()
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub organization_id: Option<Uuid>,
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    /// Non-SUPER_ADMIN users must belong to an organization.
    pub fn has_consistent_scope(&self) -> bool {
        self.role.is_super_admin() || self.organization_id.is_some()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub organization_id: Option<Uuid>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            organization_id: user.organization_id,
        }
    }
}
