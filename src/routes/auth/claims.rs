use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Identity token payload. Never mutated after signing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub role: UserRole,
    // null only for platform-level SUPER_ADMIN
    pub organization_id: Option<Uuid>,
    pub iat: i64, // issued at (UNIX timestamp)
    pub exp: i64, // expiration (UNIX timestamp)
    pub iss: String,
    pub aud: String,
}

/// The decoded identity handed to downstream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub user_id: Uuid,
    pub role: UserRole,
    pub organization_id: Option<Uuid>,
}

impl From<&Claims> for IdentityContext {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
            organization_id: claims.organization_id,
        }
    }
}

impl IdentityContext {
    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }
}
