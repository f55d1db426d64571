// utils/validation.rs
use crate::utils::error::{ClientError, Result};
use std::path::Path;

/// Valider une URL de dataset distante
pub fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ClientError::Precondition("Dataset URL cannot be empty".to_string()));
    }

    if !validator::validate_url(url) {
        return Err(ClientError::Precondition(format!("Invalid dataset URL: {}", url)));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ClientError::Precondition(format!(
            "Dataset URL must use http or https: {}",
            url
        )));
    }

    Ok(())
}

/// Valider un chemin de fichier local à envoyer
pub fn validate_file_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ClientError::Precondition("Dataset path cannot be empty".to_string()));
    }

    if !path.is_file() {
        return Err(ClientError::Precondition(format!(
            "Dataset file not found: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Valider une chaîne non vide
pub fn validate_non_empty_string(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClientError::Precondition(format!("{} cannot be empty", field_name)));
    }
    Ok(())
}
