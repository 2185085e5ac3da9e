pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod oauth;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod security;
pub mod storage;
pub mod validate;

// Re-export commonly used items for tests / the binary
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
