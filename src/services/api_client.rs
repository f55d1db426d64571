// services/api_client.rs
use crate::models::{ApiResponse, ApiUsageList, DatasetList};
use crate::services::auth::TokenManager;
use crate::utils::config::Config;
use crate::utils::error::Result;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::Form;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client HTTP autorisé, partagé par toutes les ressources
///
/// Chaque appel porte le bearer token courant. Un token proche de
/// l'expiration est renouvelé avant l'envoi; un 401 déclenche un
/// renouvellement puis exactement un nouvel essai.
#[derive(Clone)]
pub struct ApiClient {
    http_client: HttpClient,
    base_url: String,
    tokens: Arc<TokenManager>,
    refresh_margin: chrono::Duration,
    dataset_type: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<TokenManager>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::with_http_client(http_client, base_url, tokens))
    }

    pub fn with_http_client(
        http_client: HttpClient,
        base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            refresh_margin: chrono::Duration::seconds(60),
            dataset_type: "text-intent".to_string(),
        }
    }

    pub fn from_config(config: &Config, tokens: Arc<TokenManager>) -> Result<Self> {
        let http_client = HttpClient::builder().timeout(config.http_timeout()).build()?;

        Ok(Self::with_http_client(http_client, &config.api_base_url, tokens)
            .with_refresh_margin(config.token_refresh_margin())
            .with_dataset_type(&config.dataset_type))
    }

    pub fn with_refresh_margin(mut self, margin: chrono::Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_dataset_type(mut self, dataset_type: impl Into<String>) -> Self {
        self.dataset_type = dataset_type.into();
        self
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dataset_type(&self) -> &str {
        &self.dataset_type
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Envoie une requête autorisée construite par `build`
    ///
    /// `build` peut être appelé deux fois (nouvel essai après 401), il doit
    /// donc reconstruire entièrement la requête.
    pub async fn execute<T, F>(&self, build: F) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        F: Fn(&HttpClient) -> RequestBuilder,
    {
        if let Err(e) = self.tokens.refresh_if_expiring(self.refresh_margin).await {
            // L'ancien token peut encore être accepté
            warn!("⚠️  Renouvellement anticipé du token échoué: {}", e);
        }

        let token = self.tokens.bearer_token().await?;
        let response = build(&self.http_client)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && self.tokens.refresh_after_unauthorized(&token).await?
        {
            debug!("Nouvel essai après renouvellement du token");
            let token = self.tokens.bearer_token().await?;
            let response = build(&self.http_client)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .send()
                .await?;
            return ApiResponse::from_response(response).await;
        }

        ApiResponse::from_response(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        let url = self.url(path);
        self.execute(|http| http.get(&url)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        let url = self.url(path);
        self.execute(|http| http.delete(&url)).await
    }

    /// POST multipart; le formulaire est reconstruit à chaque envoi
    pub async fn post_multipart<T, F>(&self, path: &str, form: F) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        F: Fn() -> Form,
    {
        let url = self.url(path);
        self.execute(|http| http.post(&url).multipart(form())).await
    }

    /// POST multipart à champs texte uniquement
    pub async fn post_fields<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &[(&'static str, String)],
    ) -> Result<ApiResponse<T>> {
        self.post_multipart(path, || {
            fields
                .iter()
                .fold(Form::new(), |form, (name, value)| form.text(*name, value.clone()))
        })
        .await
    }

    /// Datasets du compte
    pub async fn list_datasets(&self) -> Result<ApiResponse<DatasetList>> {
        self.get("/datasets").await
    }

    /// Consommation de prédictions du compte
    pub async fn api_usage(&self) -> Result<ApiResponse<ApiUsageList>> {
        self.get("/apiusage").await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("dataset_type", &self.dataset_type)
            .finish()
    }
}
