// utils/mod.rs
pub mod error;
pub mod config;
pub mod security;
pub mod validation;
pub mod helpers;

// Ré-exports pour faciliter l'import
pub use error::{ClientError, Result};
pub use config::{Config, Credentials, FeedbackJob};
pub use security::{sign_assertion, AssertionClaims, SigningKey, JWT_BEARER_GRANT_TYPE};
pub use validation::{validate_url, validate_file_path, validate_non_empty_string};
pub use helpers::{generate_model_name, format_date, format_duration, average_duration};
