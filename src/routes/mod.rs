pub mod auth;
pub mod cron;
pub mod entitlements;
pub mod tenant;
