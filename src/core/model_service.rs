// core/model_service.rs
use crate::core::dataset_service::DatasetResource;
use crate::models::{
    ApiResponse, FeedbackResponse, LearningCurve, ModelMetadata, ModelMetrics, ModelStatus,
    PredictionResponse, TrainParams,
};
use crate::utils::error::{ClientError, Result};
use crate::utils::helpers::generate_model_name;
use crate::utils::validation::validate_non_empty_string;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ModelState {
    id: Option<String>,
    status: ModelStatus,
    metadata: Option<ModelMetadata>,
}

/// Un modèle distant entraîné sur un dataset
///
/// Cycle de vie: non rattaché → Training → Succeeded | Failed. Le statut est
/// toujours redérivé des dernières métadonnées reçues.
#[derive(Debug)]
pub struct ModelResource {
    dataset: Arc<DatasetResource>,
    state: RwLock<ModelState>,
}

impl ModelResource {
    /// Modèle non rattaché, à entraîner sur `dataset`
    pub fn new(dataset: Arc<DatasetResource>) -> Self {
        Self {
            dataset,
            state: RwLock::new(ModelState::default()),
        }
    }

    /// Rattache un modèle existant et récupère immédiatement son statut
    pub async fn bind(dataset: Arc<DatasetResource>, model_id: impl Into<String>) -> Result<Self> {
        let model = Self {
            dataset,
            state: RwLock::new(ModelState {
                id: Some(model_id.into()),
                ..ModelState::default()
            }),
        };

        let response = model.refresh_status().await?;
        if !response.is_success() {
            warn!(
                status = response.status_code(),
                "⚠️  Statut du modèle irrégulier, métadonnées possiblement absentes"
            );
        }
        Ok(model)
    }

    /// Lance l'entraînement; le nom est généré s'il est omis
    pub async fn train(&self, name: Option<String>) -> Result<ApiResponse<ModelMetadata>> {
        let mut state = self.state.write().await;
        if let Some(id) = &state.id {
            return Err(ClientError::Precondition(format!(
                "model {} already exists; use retrain instead",
                id
            )));
        }

        let dataset_id = self.dataset.id().await.ok_or_else(|| {
            ClientError::Precondition("the dataset must be created before training".to_string())
        })?;
        if !self.dataset.is_ready().await {
            return Err(ClientError::Precondition(format!(
                "dataset {} is not available yet",
                dataset_id
            )));
        }

        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(generate_model_name);

        info!(dataset_id = %dataset_id, "🚀 Entraînement du modèle {}", name);
        let response: ApiResponse<ModelMetadata> = self
            .dataset
            .client()
            .post_fields("/train", &[("name", name), ("datasetId", dataset_id)])
            .await?;

        match response.data().cloned() {
            Some(metadata) if response.is_success() => {
                if metadata.model_id.is_none() {
                    warn!("⚠️  Réponse d'entraînement sans modelId: {}", response.raw);
                }
                apply_metadata(&mut state, metadata);
                info!(model_id = ?state.id, status = %state.status, "✅ Entraînement lancé");
            }
            _ => warn!(
                status = response.status_code(),
                "⚠️  Impossible de fixer le modelId depuis la réponse"
            ),
        }

        Ok(response)
    }

    /// Récupère le statut d'entraînement
    pub async fn refresh_status(&self) -> Result<ApiResponse<ModelMetadata>> {
        let id = self.require_id().await?;
        let response: ApiResponse<ModelMetadata> =
            self.dataset.client().get(&format!("/train/{}", id)).await?;

        if let Some(metadata) = response.data().cloned() {
            let mut state = self.state.write().await;
            apply_metadata(&mut state, metadata);
        }

        Ok(response)
    }

    /// Prêt d'après le cache: statut terminal, y compris en échec
    pub async fn cached_ready(&self) -> bool {
        self.state.read().await.status.is_terminal()
    }

    /// Prêt, en rafraîchissant le statut sauf s'il est déjà `Succeeded`
    pub async fn is_ready(&self) -> bool {
        {
            let state = self.state.read().await;
            if state.id.is_none() {
                return false;
            }
            if state.status == ModelStatus::Succeeded {
                return true;
            }
        }

        if let Err(e) = self.refresh_status().await {
            warn!("⚠️  Rafraîchissement du modèle échoué: {}", e);
        }
        self.cached_ready().await
    }

    /// Classe un document; les probabilités sont renvoyées telles quelles
    pub async fn predict(&self, document: &str) -> Result<ApiResponse<PredictionResponse>> {
        let id = self.require_ready_id().await?;
        self.dataset
            .client()
            .post_fields("/intent", &[("modelId", id), ("document", document.to_string())])
            .await
    }

    /// Soumet un exemple étiqueté
    pub async fn submit_feedback(
        &self,
        document: &str,
        expected_label: &str,
    ) -> Result<ApiResponse<FeedbackResponse>> {
        let id = self.require_id().await?;
        validate_non_empty_string(expected_label, "expectedLabel")?;

        let response: ApiResponse<FeedbackResponse> = self
            .dataset
            .client()
            .post_fields(
                "/feedback",
                &[
                    ("modelId", id),
                    ("document", document.to_string()),
                    ("expectedLabel", expected_label.to_string()),
                ],
            )
            .await?;

        if let Some(feedback) = response.data() {
            let label = feedback.label.as_ref();
            debug!(
                feedback_id = ?feedback.id,
                dataset_id = ?label.and_then(|l| l.dataset_id.as_deref()),
                label = ?label.and_then(|l| l.name.as_deref()),
                "Feedback ajouté"
            );
        }

        Ok(response)
    }

    /// Relance l'entraînement, avec ou sans les exemples de feedback
    pub async fn retrain(&self, with_feedback: bool) -> Result<ApiResponse<ModelMetadata>> {
        let id = self.require_ready_id().await?;
        let params = serde_json::to_string(&TrainParams::retrain(with_feedback))?;

        info!(model_id = %id, with_feedback, "🔁 Ré-entraînement du modèle");
        let response: ApiResponse<ModelMetadata> = self
            .dataset
            .client()
            .post_fields("/retrain", &[("modelId", id), ("trainParams", params)])
            .await?;

        if let Some(metadata) = response.data().cloned() {
            let mut state = self.state.write().await;
            apply_metadata(&mut state, metadata);
        }

        Ok(response)
    }

    pub async fn metrics(&self) -> Result<ApiResponse<ModelMetrics>> {
        let id = self.require_ready_id().await?;
        self.dataset.client().get(&format!("/models/{}", id)).await
    }

    pub async fn learning_curve(&self) -> Result<ApiResponse<LearningCurve>> {
        let id = self.require_ready_id().await?;
        self.dataset.client().get(&format!("/models/{}/lc", id)).await
    }

    pub async fn id(&self) -> Option<String> {
        self.state.read().await.id.clone()
    }

    pub async fn status(&self) -> ModelStatus {
        self.state.read().await.status
    }

    pub async fn metadata(&self) -> Option<ModelMetadata> {
        self.state.read().await.metadata.clone()
    }

    pub fn dataset(&self) -> &Arc<DatasetResource> {
        &self.dataset
    }

    async fn require_id(&self) -> Result<String> {
        self.id()
            .await
            .ok_or_else(|| ClientError::Precondition("no model bound to this resource".to_string()))
    }

    async fn require_ready_id(&self) -> Result<String> {
        let id = self.require_id().await?;
        if !self.is_ready().await {
            return Err(ClientError::Precondition(format!(
                "model {} has not completed training",
                id
            )));
        }
        Ok(id)
    }
}

fn apply_metadata(state: &mut ModelState, metadata: ModelMetadata) {
    // Un identifiant déjà connu fait foi
    if state.id.is_none() {
        state.id = metadata.model_id.clone();
    }
    state.status = metadata.status();
    state.metadata = Some(metadata);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{api_client, init_test_logging, multipart_field};
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ready_dataset(server: &MockServer) -> Arc<DatasetResource> {
        Mock::given(method("GET"))
            .and(path("/datasets/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42, "available": true,
                "labelSummary": {"labels": [{"name": "billing"}, {"name": "shipping"}]}
            })))
            .mount(server)
            .await;
        Arc::new(DatasetResource::bind(api_client(server), "42").await.unwrap())
    }

    async fn mount_model_status(server: &MockServer, id: &str, status: &str, times: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(format!("/train/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "modelId": id, "datasetId": 42, "status": status, "progress": 0.5
            })));
        match times {
            Some(n) => mock.up_to_n_times(n).mount(server).await,
            None => mock.mount(server).await,
        }
    }

    #[tokio::test]
    async fn test_train_generates_name_and_binds_model_id() {
        init_test_logging();
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        Mock::given(method("POST"))
            .and(path("/train"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "modelId": "7JXCXTRXTMNLJCEF2DR5CJ46QU", "datasetId": 42, "status": "QUEUED"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = ModelResource::new(dataset);
        model.train(None).await.unwrap();

        assert_eq!(model.id().await.as_deref(), Some("7JXCXTRXTMNLJCEF2DR5CJ46QU"));
        assert_eq!(model.status().await, ModelStatus::Training);
        assert!(!model.cached_ready().await);

        let requests = server.received_requests().await.unwrap();
        let train = requests.iter().find(|r| r.url.path() == "/train").unwrap();
        let body = String::from_utf8_lossy(&train.body).into_owned();

        let name = multipart_field(&body, "name").unwrap();
        let digits = name.strip_prefix("Model_").unwrap();
        assert_eq!(digits.len(), 5);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(multipart_field(&body, "datasetId").as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_train_preconditions() {
        let server = MockServer::start().await;

        // Dataset jamais créé
        let unbound = Arc::new(DatasetResource::new(api_client(&server)));
        assert!(matches!(
            ModelResource::new(unbound).train(None).await,
            Err(ClientError::Precondition(_))
        ));

        // Dataset pas encore disponible
        Mock::given(method("GET"))
            .and(path("/datasets/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "available": false})))
            .mount(&server)
            .await;
        let pending = Arc::new(DatasetResource::bind(api_client(&server), "3").await.unwrap());
        assert!(matches!(
            ModelResource::new(pending).train(Some("intents".into())).await,
            Err(ClientError::Precondition(_))
        ));

        // Modèle déjà rattaché
        mount_model_status(&server, "M1", "SUCCEEDED", None).await;
        let dataset = ready_dataset(&server).await;
        let bound = ModelResource::bind(dataset, "M1").await.unwrap();
        assert!(matches!(bound.train(None).await, Err(ClientError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_readiness_follows_terminal_status() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        mount_model_status(&server, "M2", "RUNNING", Some(2)).await;
        mount_model_status(&server, "M2", "FAILED", None).await;

        let model = ModelResource::bind(dataset, "M2").await.unwrap();
        assert_eq!(model.status().await, ModelStatus::Training);
        assert!(!model.is_ready().await);

        // Échec: terminal, donc prêt
        assert!(model.is_ready().await);
        assert_eq!(model.status().await, ModelStatus::Failed);
    }

    #[tokio::test]
    async fn test_succeeded_model_is_not_polled_again() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        Mock::given(method("GET"))
            .and(path("/train/M3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"modelId": "M3", "status": "SUCCEEDED"})))
            .expect(1)
            .mount(&server)
            .await;

        let model = ModelResource::bind(dataset, "M3").await.unwrap();
        assert!(model.is_ready().await);
        assert!(model.is_ready().await);
    }

    #[tokio::test]
    async fn test_unbound_model_is_not_ready() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        let model = ModelResource::new(dataset);

        assert!(!model.is_ready().await);
        assert!(matches!(model.predict("hello").await, Err(ClientError::Precondition(_))));
        assert!(matches!(
            model.submit_feedback("hello", "billing").await,
            Err(ClientError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_retrain_waits_for_terminal_status() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        mount_model_status(&server, "M4", "RUNNING", Some(2)).await;
        mount_model_status(&server, "M4", "SUCCEEDED", None).await;
        Mock::given(method("POST"))
            .and(path("/retrain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"modelId": "M4", "status": "QUEUED"})))
            .expect(1)
            .mount(&server)
            .await;

        let model = ModelResource::bind(dataset, "M4").await.unwrap();
        assert!(matches!(model.retrain(true).await, Err(ClientError::Precondition(_))));

        let response = model.retrain(true).await.unwrap();
        assert!(response.is_success());
        assert_eq!(model.status().await, ModelStatus::Training);

        let requests = server.received_requests().await.unwrap();
        let retrain = requests.iter().find(|r| r.url.path() == "/retrain").unwrap();
        let body = String::from_utf8_lossy(&retrain.body).into_owned();
        assert_eq!(multipart_field(&body, "modelId").as_deref(), Some("M4"));

        let params: serde_json::Value =
            serde_json::from_str(&multipart_field(&body, "trainParams").unwrap()).unwrap();
        assert_json_eq!(params, json!({"withFeedback": true, "trainSplitRatio": 0.7}));
    }

    #[tokio::test]
    async fn test_failed_model_can_be_retrained() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        mount_model_status(&server, "M5", "FAILED", None).await;
        Mock::given(method("POST"))
            .and(path("/retrain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"modelId": "M5", "status": "QUEUED"})))
            .expect(1)
            .mount(&server)
            .await;

        let model = ModelResource::bind(dataset, "M5").await.unwrap();
        assert_eq!(model.status().await, ModelStatus::Failed);
        assert!(model.cached_ready().await);

        let response = model.retrain(false).await.unwrap();
        assert!(response.is_success());
        assert_eq!(model.status().await, ModelStatus::Training);

        let requests = server.received_requests().await.unwrap();
        let retrain = requests.iter().find(|r| r.url.path() == "/retrain").unwrap();
        let body = String::from_utf8_lossy(&retrain.body).into_owned();
        let params: serde_json::Value =
            serde_json::from_str(&multipart_field(&body, "trainParams").unwrap()).unwrap();
        assert_json_eq!(params, json!({"withFeedback": false, "trainSplitRatio": 0.7}));
    }

    #[tokio::test]
    async fn test_predict_returns_probabilities_unmodified() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        mount_model_status(&server, "M5", "SUCCEEDED", None).await;
        Mock::given(method("POST"))
            .and(path("/intent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "probabilities": [
                    {"label": "shipping", "probability": 0.2},
                    {"label": "billing", "probability": 0.8}
                ],
                "object": "predictresponse"
            })))
            .mount(&server)
            .await;

        let model = ModelResource::bind(dataset, "M5").await.unwrap();
        let prediction = model.predict("where is my invoice").await.unwrap().into_result().unwrap();

        let labels: Vec<&str> = prediction.probabilities.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["shipping", "billing"]);
    }

    #[tokio::test]
    async fn test_feedback_and_metrics_routes() {
        let server = MockServer::start().await;
        let dataset = ready_dataset(&server).await;
        mount_model_status(&server, "M6", "SUCCEEDED", None).await;
        Mock::given(method("POST"))
            .and(path("/feedback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 618, "label": {"id": 1, "datasetId": 42, "name": "billing"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/M6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "M6", "metricsData": {"labels": ["billing"], "testAccuracy": 0.9}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/models/M6/lc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"epoch": 1, "metricsData": {}}, {"epoch": 2}]
            })))
            .mount(&server)
            .await;

        let model = ModelResource::bind(dataset, "M6").await.unwrap();

        let feedback = model
            .submit_feedback("where is my invoice", "billing")
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(feedback.id.as_deref(), Some("618"));

        let requests = server.received_requests().await.unwrap();
        let sent = requests.iter().find(|r| r.url.path() == "/feedback").unwrap();
        let body = String::from_utf8_lossy(&sent.body).into_owned();
        assert_eq!(multipart_field(&body, "expectedLabel").as_deref(), Some("billing"));
        assert_eq!(multipart_field(&body, "document").as_deref(), Some("where is my invoice"));

        let metrics = model.metrics().await.unwrap().into_result().unwrap();
        assert_eq!(metrics.metrics_data.unwrap().test_accuracy, Some(0.9));

        let curve = model.learning_curve().await.unwrap().into_result().unwrap();
        assert_eq!(curve.data.len(), 2);
    }
}
