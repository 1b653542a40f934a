use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{
    organization::{Organization, OrganizationFeatures, OrganizationStatus},
    plan::PlanTier,
    user::{User, UserRole},
};

use super::{organization_repository::OrganizationRepository, user_repository::UserRepository};

/// In-memory stand-in for both repositories.
#[derive(Default)]
pub struct MockDb {
    pub organizations: Mutex<Vec<Organization>>,
    pub users: Mutex<Vec<User>>,
    pub locations: Mutex<HashMap<Uuid, u64>>,
    pub storage_bytes: Mutex<HashMap<Uuid, u64>>,
    pub should_fail: AtomicBool,
    pub lookups: AtomicUsize,
}

pub fn sample_organization(slug: &str, plan: PlanTier) -> Organization {
    let now = OffsetDateTime::now_utc();
    Organization {
        id: Uuid::new_v4(),
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        subdomain: slug.to_string(),
        domain: None,
        plan,
        status: OrganizationStatus::Active,
        max_users: None,
        max_locations: None,
        max_storage_gb: None,
        features: OrganizationFeatures::for_plan::<&str>(plan, &[]),
        created_at: now,
        updated_at: now,
    }
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_organization(self, organization: Organization) -> Self {
        self.organizations.lock().unwrap().push(organization);
        self
    }

    pub fn add_user(&self, organization_id: Option<Uuid>, role: UserRole) -> User {
        let user = User {
            id: Uuid::new_v4(),
            organization_id,
            email: format!("{}@example.com", Uuid::new_v4()),
            role,
            password_hash: String::new(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn insert_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }

    pub fn set_locations(&self, organization_id: Uuid, count: u64) {
        self.locations
            .lock()
            .unwrap()
            .insert(organization_id, count);
    }

    pub fn set_storage_bytes(&self, organization_id: Uuid, bytes: u64) {
        self.storage_bytes
            .lock()
            .unwrap()
            .insert(organization_id, bytes);
    }

    /// Applies a plan change the way the billing collaborator does: plan and
    /// every feature flag in one write.
    pub fn change_plan(&self, organization_id: Uuid, plan: PlanTier) {
        let mut organizations = self.organizations.lock().unwrap();
        if let Some(org) = organizations.iter_mut().find(|o| o.id == organization_id) {
            org.plan = plan;
            org.features = OrganizationFeatures::for_plan::<&str>(plan, &[]);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    fn find_org<F>(&self, predicate: F) -> Result<Option<Organization>, sqlx::Error>
    where
        F: Fn(&Organization) -> bool,
    {
        self.check()?;
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .iter()
            .find(|org| predicate(org))
            .cloned())
    }
}

#[async_trait]
impl OrganizationRepository for MockDb {
    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, sqlx::Error> {
        self.find_org(|org| org.id == organization_id)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, sqlx::Error> {
        self.find_org(|org| org.slug == slug)
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Organization>, sqlx::Error> {
        self.find_org(|org| {
            org.domain
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(domain))
        })
    }

    async fn find_by_subdomain(
        &self,
        subdomain: &str,
    ) -> Result<Option<Organization>, sqlx::Error> {
        self.find_org(|org| org.subdomain.eq_ignore_ascii_case(subdomain))
    }

    async fn count_member_users(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.organization_id == Some(organization_id) && u.role.is_member())
            .count() as u64)
    }

    async fn count_locations(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        self.check()?;
        Ok(self
            .locations
            .lock()
            .unwrap()
            .get(&organization_id)
            .copied()
            .unwrap_or(0))
    }

    async fn storage_bytes_used(&self, organization_id: Uuid) -> Result<u64, sqlx::Error> {
        self.check()?;
        Ok(self
            .storage_bytes
            .lock()
            .unwrap()
            .get(&organization_id)
            .copied()
            .unwrap_or(0))
    }
}

#[async_trait]
impl UserRepository for MockDb {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
            .cloned())
    }
}
