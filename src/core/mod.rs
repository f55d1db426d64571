// core/mod.rs
pub mod dataset_service;
pub mod model_service;

// Ré-exports pour faciliter l'import
pub use dataset_service::DatasetResource;
pub use model_service::ModelResource;
