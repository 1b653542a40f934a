use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    organization::{limit_override, Organization, OrganizationFeatures, OrganizationStatus},
    plan::PlanTier,
    user::member_role_spellings,
};

use super::organization_repository::OrganizationRepository;

const ORGANIZATION_COLUMNS: &str = r#"
    id, name, slug, subdomain, domain, plan, status,
    max_users::BIGINT AS max_users,
    max_locations::BIGINT AS max_locations,
    max_storage_gb::BIGINT AS max_storage_gb,
    feature_blog, feature_crm, feature_emailing, feature_shop, feature_whatsapp,
    feature_sms, feature_social_media, feature_stock, feature_multi_location,
    feature_multi_user, created_at, updated_at
"#;

pub struct PostgresOrganizationRepository {
    pub pool: PgPool,
}

#[derive(Debug, FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    slug: String,
    subdomain: String,
    domain: Option<String>,
    plan: String,
    status: String,
    max_users: Option<i64>,
    max_locations: Option<i64>,
    max_storage_gb: Option<i64>,
    feature_blog: bool,
    feature_crm: bool,
    feature_emailing: bool,
    feature_shop: bool,
    feature_whatsapp: bool,
    feature_sms: bool,
    feature_social_media: bool,
    feature_stock: bool,
    feature_multi_location: bool,
    feature_multi_user: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        let plan = PlanTier::from_stored(&row.plan).unwrap_or_else(|| {
            warn!(organization_id = %row.id, plan = %row.plan, "unknown plan, applying SOLO limits");
            PlanTier::Solo
        });
        let status = OrganizationStatus::from_stored(&row.status).unwrap_or_else(|| {
            warn!(organization_id = %row.id, status = %row.status, "unknown status, treating as suspended");
            OrganizationStatus::Suspended
        });

        Organization {
            id: row.id,
            name: row.name,
            slug: row.slug,
            subdomain: row.subdomain,
            domain: row.domain,
            plan,
            status,
            max_users: limit_override(row.max_users),
            max_locations: limit_override(row.max_locations),
            max_storage_gb: limit_override(row.max_storage_gb),
            features: OrganizationFeatures {
                blog: row.feature_blog,
                crm: row.feature_crm,
                emailing: row.feature_emailing,
                shop: row.feature_shop,
                whatsapp: row.feature_whatsapp,
                sms: row.feature_sms,
                social_media: row.feature_social_media,
                stock: row.feature_stock,
                multi_location: row.feature_multi_location,
                multi_user: row.feature_multi_user,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresOrganizationRepository {
    async fn find_one(
        &self,
        predicate: &str,
        value: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE {predicate} LIMIT 1");
        let row = sqlx::query_as::<_, OrganizationRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Organization::from))
    }
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
        let row = sqlx::query_as::<_, OrganizationRow>(&sql)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Organization::from))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, sqlx::Error> {
        self.find_one("slug = $1", slug).await
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, sqlx::Error> {
        self.find_one("lower(domain) = lower($1)", domain).await
    }

    async fn find_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        self.find_one("lower(subdomain) = lower($1)", subdomain)
            .await
    }

    async fn count_member_users(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE organization_id = $1
              AND upper(trim(role)) = ANY($2)
            "#,
        )
        .bind(organization_id)
        .bind(member_role_spellings())
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(count))
    }

    async fn count_locations(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(to_count(count))
    }

    async fn storage_bytes_used(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        let bytes: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(size_bytes), 0)::BIGINT
            FROM stored_files
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_count(bytes))
    }
}
