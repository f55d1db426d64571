// Modèle: session.rs
pub mod session;
pub use session::{TokenResponse, ApiUsage, ApiUsageList, PlanData};

// Modèle: dataset.rs
pub mod dataset;
pub use dataset::{
    DatasetSource, DatasetMetadata, DatasetLabel,
    LabelSummary, DatasetList, DeletionStatus
};

// Modèle: model.rs
pub mod model;
pub use model::{
    ModelStatus, ModelMetadata, ModelList, TrainParams,
    PredictionResponse, LabelProbability, FeedbackResponse,
    FeedbackLabel, ModelMetrics, MetricsData,
    PrecisionRecallCurve, LearningCurve, LearningCurveEpoch
};

// Modèle: feedback.rs
pub mod feedback;
pub use feedback::{
    FeedbackRecord, UploadBudget, UploadOutcome, UploadReport
};

use crate::utils::error::{ClientError, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::warn;

/// Réponse du backend: code HTTP + corps
///
/// Le backend renvoie un corps JSON structuré même en cas d'échec; les
/// appelants distinguent le succès par le code, pas par une erreur.
/// `data` n'est renseigné que pour une réponse 2xx dont le corps a la forme
/// attendue, `raw` contient toujours le corps complet.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub data: Option<T>,
    pub raw: serde_json::Value,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Lit le corps d'une réponse reqwest
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let body = response.text().await?;
        Ok(Self::from_parts(status, &body))
    }

    pub fn from_parts(status: StatusCode, body: &str) -> Self {
        let raw = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
        };

        let data = if status.is_success() {
            match serde_json::from_value::<T>(raw.clone()) {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("⚠️  Corps de réponse inattendu (status {}): {}", status, e);
                    None
                }
            }
        } else {
            None
        };

        Self { status, data, raw }
    }
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Convertit la paire (corps, code) en résultat pour les appelants qui
    /// préfèrent une erreur franche
    pub fn into_result(self) -> Result<T> {
        if !self.status.is_success() {
            return Err(ClientError::Remote {
                status: self.status.as_u16(),
                body: self.raw.to_string(),
            });
        }

        self.data.ok_or_else(|| {
            ClientError::ParseError(format!("unexpected response body: {}", self.raw))
        })
    }
}

/// Identifiants renvoyés tantôt en chaîne, tantôt en nombre
pub(crate) fn deserialize_optional_id<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_body_is_parsed() {
        let response: ApiResponse<DatasetMetadata> =
            ApiResponse::from_parts(StatusCode::OK, r#"{"id": 42, "available": false}"#);

        assert!(response.is_success());
        let data = response.data().unwrap();
        assert_eq!(data.id.as_deref(), Some("42"));
        assert_eq!(data.available, Some(false));
    }

    #[test]
    fn test_error_body_kept_raw() {
        let response: ApiResponse<DatasetMetadata> = ApiResponse::from_parts(
            StatusCode::BAD_REQUEST,
            r#"{"message": "Invalid file type"}"#,
        );

        assert!(!response.is_success());
        assert!(response.data.is_none());
        assert_eq!(response.raw["message"], "Invalid file type");

        match response.into_result() {
            Err(ClientError::Remote { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid file type"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_non_json_body() {
        let response: ApiResponse<DatasetMetadata> =
            ApiResponse::from_parts(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(response.raw, serde_json::Value::String("<html>bad gateway</html>".into()));

        let response: ApiResponse<PredictionResponse> =
            ApiResponse::from_parts(StatusCode::OK, "");
        assert_eq!(response.raw, serde_json::Value::Null);
        assert!(matches!(response.into_result(), Err(ClientError::ParseError(_))));
    }
}
