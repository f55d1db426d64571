// core/dataset_service.rs
use crate::models::{ApiResponse, DatasetMetadata, DatasetSource, DeletionStatus, ModelList};
use crate::services::api_client::ApiClient;
use crate::utils::error::{ClientError, Result};
use crate::utils::validation::{validate_file_path, validate_url};
use reqwest::multipart::{Form, Part};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct DatasetState {
    id: Option<String>,
    available: bool,
    /// Ne fait que croître
    labels: HashSet<String>,
    metadata: Option<DatasetMetadata>,
}

/// Un dataset distant
///
/// L'identifiant n'est fixé qu'une fois (création ou rattachement). La
/// suppression est asynchrone côté backend: l'objet reste utilisable pour
/// suivre son statut.
#[derive(Debug)]
pub struct DatasetResource {
    client: ApiClient,
    state: RwLock<DatasetState>,
}

impl DatasetResource {
    /// Dataset non rattaché, à créer
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: RwLock::new(DatasetState::default()),
        }
    }

    /// Rattache un dataset existant et récupère immédiatement son statut
    pub async fn bind(client: ApiClient, dataset_id: impl Into<String>) -> Result<Self> {
        let dataset = Self {
            client,
            state: RwLock::new(DatasetState {
                id: Some(dataset_id.into()),
                ..DatasetState::default()
            }),
        };

        dataset.refresh_status().await?;
        Ok(dataset)
    }

    /// Crée le dataset côté backend depuis un fichier ou une URL
    pub async fn create(&self, source: DatasetSource) -> Result<ApiResponse<DatasetMetadata>> {
        // Verrou tenu pendant l'envoi: deux créations concurrentes ne passent pas
        let mut state = self.state.write().await;
        if let Some(id) = &state.id {
            return Err(ClientError::Precondition(format!(
                "dataset {} already exists; create a new resource for another dataset",
                id
            )));
        }

        let dataset_type = self.client.dataset_type().to_string();
        let response: ApiResponse<DatasetMetadata> = match &source {
            DatasetSource::File(path) => {
                validate_file_path(path)?;
                let bytes = tokio::fs::read(path).await?;
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "dataset.csv".to_string());

                info!("📤 Envoi du dataset {} ({} octets)", path.display(), bytes.len());
                self.client
                    .post_multipart("/datasets/upload", || {
                        Form::new()
                            .part("data", Part::bytes(bytes.clone()).file_name(file_name.clone()))
                            .text("type", dataset_type.clone())
                    })
                    .await?
            }
            DatasetSource::Url(url) => {
                validate_url(url)?;
                info!("📤 Création du dataset depuis {}", url);
                self.client
                    .post_fields(
                        "/datasets/upload",
                        &[("path", url.clone()), ("type", dataset_type.clone())],
                    )
                    .await?
            }
        };

        if !response.is_success() {
            warn!(status = response.status_code(), "⚠️  Création du dataset refusée");
            return Ok(response);
        }

        match response.data().cloned() {
            Some(metadata) if metadata.id.is_some() => {
                state.id = metadata.id.clone();
                info!(dataset_id = ?state.id, "✅ Dataset créé");
                apply_metadata(&mut state, metadata);
            }
            _ => warn!("⚠️  Réponse de création sans identifiant: {}", response.raw),
        }

        Ok(response)
    }

    /// Variante à deux options; sans fichier ni URL, échoue en `Precondition`
    pub async fn create_from(
        &self,
        file: Option<std::path::PathBuf>,
        url: Option<String>,
    ) -> Result<ApiResponse<DatasetMetadata>> {
        let source = DatasetSource::from_options(file, url)?;
        self.create(source).await
    }

    /// Récupère les métadonnées et fusionne les labels connus
    pub async fn refresh_status(&self) -> Result<ApiResponse<DatasetMetadata>> {
        let id = self.require_id().await?;
        let response: ApiResponse<DatasetMetadata> =
            self.client.get(&format!("/datasets/{}", id)).await?;

        match response.data().cloned() {
            Some(metadata) => {
                let mut state = self.state.write().await;
                apply_metadata(&mut state, metadata);
            }
            None => warn!(
                dataset_id = %id,
                status = response.status_code(),
                "⚠️  Statut du dataset indisponible"
            ),
        }

        Ok(response)
    }

    /// Disponibilité d'après les dernières métadonnées, sans appel réseau
    pub async fn cached_ready(&self) -> bool {
        self.state.read().await.available
    }

    /// Disponibilité, avec au plus un rafraîchissement si le cache dit non
    ///
    /// Sans métadonnées, renvoie `false` sans appel. Ne renvoie jamais d'erreur.
    pub async fn is_ready(&self) -> bool {
        {
            let state = self.state.read().await;
            if state.metadata.is_none() {
                debug!("Aucune métadonnée de dataset, pas encore prêt");
                return false;
            }
            if state.available {
                return true;
            }
        }

        if let Err(e) = self.refresh_status().await {
            warn!("⚠️  Rafraîchissement du dataset échoué: {}", e);
        }
        self.cached_ready().await
    }

    /// Demande la suppression; le backend l'effectue en tâche de fond
    pub async fn delete(&self) -> Result<ApiResponse<DeletionStatus>> {
        let id = self.require_id().await?;
        info!(dataset_id = %id, "🗑️  Suppression du dataset demandée");
        self.client.delete(&format!("/datasets/{}", id)).await
    }

    /// Statut de la suppression (le backend attend un DELETE sur cette route)
    pub async fn deletion_status(&self) -> Result<ApiResponse<DeletionStatus>> {
        let id = self.require_id().await?;
        self.client.delete(&format!("/deletion/{}", id)).await
    }

    pub async fn associated_models(&self) -> Result<ApiResponse<ModelList>> {
        let id = self.require_id().await?;
        self.client.get(&format!("/datasets/{}/models", id)).await
    }

    pub async fn id(&self) -> Option<String> {
        self.state.read().await.id.clone()
    }

    pub async fn labels(&self) -> HashSet<String> {
        self.state.read().await.labels.clone()
    }

    pub async fn has_label(&self, label: &str) -> bool {
        self.state.read().await.labels.contains(label)
    }

    pub async fn metadata(&self) -> Option<DatasetMetadata> {
        self.state.read().await.metadata.clone()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn require_id(&self) -> Result<String> {
        self.id()
            .await
            .ok_or_else(|| ClientError::Precondition("no dataset bound to this resource".to_string()))
    }
}

fn apply_metadata(state: &mut DatasetState, metadata: DatasetMetadata) {
    state.available = metadata.is_available();

    match metadata.label_names() {
        Some(names) => {
            for name in names {
                state.labels.insert(name.to_string());
            }
        }
        None => debug!(dataset_id = ?state.id, "Pas de labelSummary dans les métadonnées"),
    }

    state.metadata = Some(metadata);
}
