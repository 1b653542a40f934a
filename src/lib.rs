pub mod app;
pub mod config;
pub mod db;
pub mod gate;
pub mod models;
pub mod responses;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod worker;

pub use state::AppState;
