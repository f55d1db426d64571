// src/main.rs
use intent_platform_client::{
    format_date, format_duration, ApiClient, ClientError, Config, DatasetResource, FeedbackJob,
    FeedbackUploader, ModelResource, Result, TokenManager, UploadPolicy, NAME, VERSION,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Chargement de la configuration (.env compris)
    let config = Config::from_env()?;

    // Initialisation du logging
    setup_tracing(&config);
    info!("🚀 Démarrage de {} v{}", NAME, VERSION);

    let tokens = TokenManager::from_config(&config).await.map_err(|e| {
        error!("❌ Impossible d'ouvrir la session: {}", e);
        e
    })?;

    match tokens.time_remaining().await {
        Ok(remaining) => {
            let expires_at = tokens.expires_at().await.map(|at| format_date(&at));
            info!(
                "⏱️  Session valide encore {} (jusqu'au {})",
                format_duration(remaining.num_seconds().max(0) as u64),
                expires_at.unwrap_or_default()
            );
        }
        Err(ClientError::UnknownExpiry) => info!("⏱️  Token existant, expiration inconnue"),
        Err(e) => return Err(e),
    }

    let client = ApiClient::from_config(&config, tokens)?;
    report_account(&client).await;

    match config.feedback_job() {
        Some(job) => run_feedback_upload(&config, client, job).await?,
        None => info!("ℹ️  DATASET_ID, MODEL_ID et FEEDBACK_FILE absents: aucun envoi de feedback"),
    }

    Ok(())
}

/// Configure le tracing pour le logging structuré
fn setup_tracing(config: &Config) {
    let log_level = config
        .log_level
        .parse()
        .unwrap_or(tracing::Level::INFO);

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(if config.log_format == "json" {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        } else {
            Box::new(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false),
            ) as Box<dyn tracing_subscriber::Layer<_> + Send + Sync>
        });

    subscriber.init();
}

/// Consommation et datasets du compte; les échecs sont seulement loggés
async fn report_account(client: &ApiClient) {
    match client.api_usage().await {
        Ok(response) => match response.data() {
            Some(usage) => info!(
                predictions_remaining = ?usage.predictions_remaining(),
                plans = usage.data.len(),
                "📊 Consommation de l'API"
            ),
            None => warn!(status = response.status_code(), "⚠️  Consommation indisponible"),
        },
        Err(e) => warn!("⚠️  Consommation indisponible: {}", e),
    }

    match client.list_datasets().await {
        Ok(response) => match response.data() {
            Some(datasets) => info!("📁 {} datasets sur le compte", datasets.data.len()),
            None => warn!(status = response.status_code(), "⚠️  Liste des datasets indisponible"),
        },
        Err(e) => warn!("⚠️  Liste des datasets indisponible: {}", e),
    }
}

async fn run_feedback_upload(config: &Config, client: ApiClient, job: FeedbackJob) -> Result<()> {
    let dataset = Arc::new(DatasetResource::bind(client, job.dataset_id).await?);
    let model = Arc::new(ModelResource::bind(dataset, job.model_id).await?);
    let records = FeedbackUploader::read_records(&job.file).await?;

    let handle =
        FeedbackUploader::with_policy(model, UploadPolicy::from_config(config)).spawn(records);

    // Ctrl-C: arrêt propre entre deux enregistrements
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interruption demandée, arrêt de l'envoi");
            cancel.cancel();
        }
    });

    let report = handle.join().await?;
    let summary = serde_json::to_string(&report)?;
    info!(report = %summary, "📋 Bilan de l'envoi de feedback");
    Ok(())
}
