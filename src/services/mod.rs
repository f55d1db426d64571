// services/mod.rs
pub mod auth;
pub mod api_client;

// Ré-exports pour faciliter l'import
pub use auth::{Session, TokenManager};
pub use api_client::ApiClient;
