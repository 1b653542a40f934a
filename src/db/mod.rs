pub mod memory_rate_limit_store;
#[cfg(test)]
pub mod mock_db;
pub mod organization_repository;
pub mod postgres_organization_repository;
pub mod postgres_rate_limit_store;
pub mod postgres_user_repository;
pub mod rate_limit_store;
pub mod user_repository;
