pub mod access;
pub mod entitlements;
pub mod rate_limit;
pub mod tenant;
pub mod token;
