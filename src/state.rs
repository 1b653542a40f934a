use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::{Config, RateLimitBackend};
use crate::db::{
    memory_rate_limit_store::MemoryRateLimitStore,
    organization_repository::OrganizationRepository,
    postgres_organization_repository::PostgresOrganizationRepository,
    postgres_rate_limit_store::PostgresRateLimitStore,
    postgres_user_repository::PostgresUserRepository,
    rate_limit_store::RateLimitStore, user_repository::UserRepository,
};
use crate::services::{
    access::RoleMatrix, entitlements::EntitlementGuard, rate_limit::RateLimiter,
    tenant::TenantResolver, token::TokenService,
};

/// Every long-lived dependency of the request path, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub tokens: Arc<TokenService>,
    pub tenants: Arc<TenantResolver>,
    pub roles: Arc<RoleMatrix>,
    pub entitlements: Arc<EntitlementGuard>,
    pub rate_limiter: Arc<RateLimiter>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Connects to Postgres and wires the services on top of it.
    pub async fn initialize(config: Config) -> Result<Self, sqlx::Error> {
        let pool = establish_connection(&config.database_url).await?;

        let organizations = Arc::new(PostgresOrganizationRepository { pool: pool.clone() })
            as Arc<dyn OrganizationRepository>;
        let users =
            Arc::new(PostgresUserRepository { pool: pool.clone() }) as Arc<dyn UserRepository>;
        let rate_store: Arc<dyn RateLimitStore> = match config.rate_limit_backend {
            RateLimitBackend::Postgres => Arc::new(PostgresRateLimitStore { pool: pool.clone() }),
            RateLimitBackend::Memory => Arc::new(MemoryRateLimitStore::new()),
        };

        let mut state = Self::from_parts(config, organizations, users, rate_store);
        state.pool = Some(pool);
        Ok(state)
    }

    pub fn from_parts(
        config: Config,
        organizations: Arc<dyn OrganizationRepository>,
        users: Arc<dyn UserRepository>,
        rate_store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let tokens = TokenService::new(
            config.jwt_keys.clone(),
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
        );
        let tenants = TenantResolver::new(organizations.clone(), config.tenant.clone());
        let entitlements = EntitlementGuard::new(organizations.clone());
        let rate_limiter = RateLimiter::new(rate_store, config.rate_limit.clone());

        Self {
            config: Arc::new(config),
            organizations,
            users,
            tokens: Arc::new(tokens),
            tenants: Arc::new(tenants),
            roles: Arc::new(RoleMatrix::standard()),
            entitlements: Arc::new(entitlements),
            rate_limiter: Arc::new(rate_limiter),
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            info!("database pool closed");
        }
    }
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPool::connect(database_url).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("connected to the database");
    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::{Config, RateLimitBackend};
    use crate::db::{memory_rate_limit_store::MemoryRateLimitStore, mock_db::MockDb};
    use crate::services::{
        rate_limit::RateLimitSettings, tenant::TenantSettings, token::tests::TEST_SECRET,
    };
    use crate::utils::jwt::JwtKeys;

    use super::AppState;

    pub fn test_config() -> Config {
        Config {
            database_url: "postgres://unused".into(),
            jwt_keys: JwtKeys::from_secret(TEST_SECRET).unwrap(),
            production: false,
            bind_addr: ([127, 0, 0, 1], 0).into(),
            frontend_origin: None,
            jwt_issuer: "tenantgate".into(),
            jwt_audience: "tenantgate-web".into(),
            tenant: TenantSettings {
                default_slug: None,
                dev_hosts: Vec::new(),
                dev_hosts_enabled: false,
            },
            site_password: None,
            cron_secret: None,
            trust_proxy_headers: false,
            rate_limit: RateLimitSettings::default(),
            rate_limit_backend: RateLimitBackend::Memory,
        }
    }

    /// State over `db` and a fresh in-memory rate-limit store.
    pub fn test_state(db: Arc<MockDb>, configure: impl FnOnce(&mut Config)) -> AppState {
        let mut config = test_config();
        configure(&mut config);
        AppState::from_parts(
            config,
            db.clone(),
            db,
            Arc::new(MemoryRateLimitStore::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_support::test_state;
    use crate::db::mock_db::{sample_organization, MockDb};
    use crate::models::{plan::PlanTier, user::UserRole};
    use crate::services::entitlements::QuotaKind;

    #[tokio::test]
    async fn services_share_the_injected_repositories() {
        let org = sample_organization("laia", PlanTier::Solo);
        let org_id = org.id;
        let db = Arc::new(MockDb::new().with_organization(org));
        let state = test_state(db.clone(), |config| {
            config.tenant.default_slug = Some("laia".into());
        });

        let resolved = state.tenants.resolve("anything.tld").await;
        assert_eq!(resolved.organization().map(|o| o.id), Some(org_id));

        db.add_user(Some(org_id), UserRole::OrgAdmin);
        let decision = state
            .entitlements
            .check_quota(org_id, QuotaKind::Users)
            .await
            .unwrap();
        assert!(!decision.allowed);

        // no pool to close
        state.shutdown().await;
    }
}
