use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::deserialize_optional_id;
use crate::utils::error::{ClientError, Result};

/// Source d'un nouveau dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Fichier CSV local envoyé en multipart (`data`)
    File(PathBuf),
    /// URL publique que le backend télécharge lui-même (`path`)
    Url(String),
}

impl DatasetSource {
    /// Choisit la source parmi deux options; le fichier l'emporte
    pub fn from_options(file: Option<PathBuf>, url: Option<String>) -> Result<Self> {
        match (file, url) {
            (Some(path), _) => Ok(DatasetSource::File(path)),
            (None, Some(url)) => Ok(DatasetSource::Url(url)),
            (None, None) => Err(ClientError::Precondition(
                "a file path or an URL is required to create a dataset".to_string(),
            )),
        }
    }
}

/// Métadonnées d'un dataset telles que renvoyées par le backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Absent tant que le traitement n'est pas terminé
    pub label_summary: Option<LabelSummary>,
    pub total_examples: Option<u64>,
    pub total_labels: Option<u64>,
    pub available: Option<bool>,
    pub status_msg: Option<String>,
    #[serde(rename = "type")]
    pub dataset_type: Option<String>,
    pub object: Option<String>,
}

impl DatasetMetadata {
    pub fn is_available(&self) -> bool {
        self.available.unwrap_or(false)
    }

    /// Noms de labels présents dans le résumé, s'il existe
    pub fn label_names(&self) -> Option<Vec<&str>> {
        self.label_summary.as_ref().map(|summary| {
            summary
                .labels
                .iter()
                .filter_map(|label| label.name.as_deref())
                .collect()
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSummary {
    #[serde(default)]
    pub labels: Vec<DatasetLabel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetLabel {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub dataset_id: Option<String>,
    pub name: Option<String>,
    pub num_examples: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetList {
    #[serde(default)]
    pub data: Vec<DatasetMetadata>,
    pub object: Option<String>,
}

/// Statut d'une suppression asynchrone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionStatus {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub deleted_object_id: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub deletion_type: Option<String>,
    pub object: Option<String>,
}

impl DeletionStatus {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some("SUCCEEDED")
    }
}
