use serde::{Deserialize, Serialize};
use std::fmt;

use super::deserialize_optional_id;

/// Ratio train/validation fixe envoyé lors d'un ré-entraînement
pub const RETRAIN_SPLIT_RATIO: f64 = 0.7;

/// Statut d'un modèle distant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelStatus {
    /// Aucun identifiant ou aucune métadonnée récupérée
    #[default]
    Unknown,
    Training,
    Succeeded,
    Failed,
}

impl ModelStatus {
    /// Dérive le statut depuis la chaîne littérale du backend
    pub fn from_backend(status: Option<&str>) -> Self {
        match status {
            None => ModelStatus::Unknown,
            Some("SUCCEEDED") => ModelStatus::Succeeded,
            Some("FAILED") => ModelStatus::Failed,
            // QUEUED, RUNNING, ... : toujours en cours
            Some(_) => ModelStatus::Training,
        }
    }

    /// Prêt = terminal, y compris en échec
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModelStatus::Succeeded | ModelStatus::Failed)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Unknown => write!(f, "unknown"),
            ModelStatus::Training => write!(f, "training"),
            ModelStatus::Succeeded => write!(f, "succeeded"),
            ModelStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Métadonnées d'un modèle (entraînement ou statut)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub model_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub dataset_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub dataset_version_id: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub progress: Option<f64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub failure_msg: Option<String>,
    pub model_type: Option<String>,
    pub train_params: Option<serde_json::Value>,
    pub train_stats: Option<serde_json::Value>,
    pub object: Option<String>,
}

impl ModelMetadata {
    pub fn status(&self) -> ModelStatus {
        ModelStatus::from_backend(self.status.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelMetadata>,
    pub object: Option<String>,
}

/// Paramètres d'entraînement encodés en JSON dans le champ `trainParams`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainParams {
    pub with_feedback: bool,
    pub train_split_ratio: f64,
}

impl TrainParams {
    pub fn retrain(with_feedback: bool) -> Self {
        Self {
            with_feedback,
            train_split_ratio: RETRAIN_SPLIT_RATIO,
        }
    }
}

/// Résultat d'une prédiction: labels classés tels que fournis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub probabilities: Vec<LabelProbability>,
    pub object: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProbability {
    pub label: String,
    pub probability: f64,
}

/// Accusé de réception d'un exemple de feedback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub label: Option<FeedbackLabel>,
    pub created_at: Option<String>,
    pub object: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackLabel {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub dataset_id: Option<String>,
    pub name: Option<String>,
}

/// Métriques d'un modèle entraîné
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetrics {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub metrics_data: Option<MetricsData>,
    pub created_at: Option<String>,
    pub language: Option<String>,
    pub algorithm: Option<String>,
    pub object: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsData {
    pub f1: Option<serde_json::Value>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub test_accuracy: Option<f64>,
    pub training_loss: Option<f64>,
    pub training_accuracy: Option<f64>,
    pub confusion_matrix: Option<serde_json::Value>,
    pub precision_recall_curve: Option<PrecisionRecallCurve>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    #[serde(default)]
    pub f1: Vec<f64>,
    #[serde(default)]
    pub precision: Vec<f64>,
    #[serde(default)]
    pub recall: Vec<f64>,
    #[serde(default)]
    pub threshold: Vec<f64>,
}

/// Courbe d'apprentissage, une entrée par epoch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningCurve {
    #[serde(default)]
    pub data: Vec<LearningCurveEpoch>,
    pub object: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningCurveEpoch {
    pub epoch: Option<u32>,
    pub metrics_data: Option<serde_json::Value>,
    pub epoch_results: Option<serde_json::Value>,
}
