// src/lib.rs
// Modules principaux
pub mod models;
pub mod core;
pub mod services;
pub mod workers;
pub mod utils;

// Ré-exports pour faciliter l'utilisation
pub use models::*;
pub use crate::core::{DatasetResource, ModelResource};
pub use services::*;
pub use workers::*;
pub use utils::*;

// Version de la bibliothèque
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "Intent Platform Client";

// Types communs
pub use chrono::{DateTime, Utc};
pub use tokio_util::sync::CancellationToken;
