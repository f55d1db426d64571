//! # Workers Module
//!
//! Tâches longues exécutées en arrière-plan:
//! - `feedback_uploader.rs`: envoi en masse d'exemples de feedback
//!
//! ## Fonctionnement
//! - Un envoi = une tâche tokio, pilotée par une `UploadHandle`
//! - Essais bornés par enregistrement, budget d'erreurs global
//! - Annulation entre deux enregistrements et pendant les attentes
//! - Bilan structuré (`UploadReport`) en fin d'envoi

pub mod feedback_uploader;

pub use feedback_uploader::{FeedbackUploader, UploadHandle, UploadPolicy};
