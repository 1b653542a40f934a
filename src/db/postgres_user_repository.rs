use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::{
    db::user_repository::UserRepository,
    models::user::{User, UserRole},
};

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    organization_id: Option<Uuid>,
    email: String,
    role: String,
    password_hash: Option<String>,
}

impl UserRow {
    /// Rows whose role is not in the alias table, or tenant roles without an
    /// organization, are treated as unusable rather than guessed at.
    fn into_user(self) -> Option<User> {
        let Some(role) = UserRole::from_stored(&self.role) else {
            warn!(user_id = %self.id, role = %self.role, "user row has an unrecognised role");
            return None;
        };

        let user = User {
            id: self.id,
            organization_id: self.organization_id,
            email: self.email,
            role,
            password_hash: self.password_hash.unwrap_or_default(),
        };

        if !user.has_consistent_scope() {
            warn!(user_id = %user.id, role = %user.role, "tenant user without organization");
            return None;
        }

        Some(user)
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, organization_id, email, role, password_hash
            FROM users
            WHERE lower(email) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(UserRow::into_user))
    }
}
