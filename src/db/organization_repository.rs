use async_trait::async_trait;
use uuid::Uuid;

use crate::models::organization::Organization;

/// Read-only access to tenants and the live usage figures quotas are checked against.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, sqlx::Error>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, sqlx::Error>;
    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, sqlx::Error>;
    async fn find_by_subdomain(&self, subdomain: &str)
        -> Result<Option<Organization>, sqlx::Error>;

    /// Users of the organization that are not CLIENTs.
    async fn count_member_users(&self, organization_id: Uuid) -> Result<u64, sqlx::Error>;
    async fn count_locations(&self, organization_id: Uuid) -> Result<u64, sqlx::Error>;
    async fn storage_bytes_used(&self, organization_id: Uuid) -> Result<u64, sqlx::Error>;
}
