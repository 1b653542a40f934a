pub mod organization;
pub mod plan;
pub mod user;
