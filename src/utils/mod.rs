pub mod ip;
pub mod jwt;
pub mod password;
pub mod signing;
