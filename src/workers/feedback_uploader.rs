// workers/feedback_uploader.rs
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::core::model_service::ModelResource;
use crate::models::{FeedbackRecord, UploadOutcome, UploadReport};
use crate::utils::config::Config;
use crate::utils::error::{ClientError, Result};
use crate::utils::helpers::average_duration;

/// Paramètres de l'envoi en masse
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Nombre maximum d'enregistrements considérés (par position)
    pub limit: usize,
    /// Valeur initiale du compteur d'essais par enregistrement
    pub first_try: u32,
    /// Borne exclusive du compteur d'essais
    pub max_tries: u32,
    /// Tentatives échouées tolérées sur tout l'envoi
    pub error_budget: u32,
    /// Au-delà, l'envoi est abandonné
    pub max_connection_faults: u32,
    /// Attente = essai × unité après un refus
    pub retry_delay_unit: Duration,
    /// Attente fixe après une panne réseau
    pub connection_backoff: Duration,
    /// Pause après chaque enregistrement accepté ou refusé
    pub pacing_delay: Duration,
    /// Fréquence du log de progression
    pub progress_interval: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            limit: 1000,
            first_try: 2,
            max_tries: 10,
            error_budget: 20,
            max_connection_faults: 5,
            retry_delay_unit: Duration::from_secs(1),
            connection_backoff: Duration::from_secs(120),
            pacing_delay: Duration::from_secs(2),
            progress_interval: 5,
        }
    }
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.feedback_upload_limit,
            retry_delay_unit: Duration::from_millis(config.feedback_retry_delay_ms),
            connection_backoff: Duration::from_secs(config.feedback_connection_backoff_seconds),
            pacing_delay: Duration::from_millis(config.feedback_pacing_ms),
            ..Self::default()
        }
    }

    fn budget_exhausted(&self, report: &UploadReport) -> bool {
        report.budget.failed_attempts >= self.error_budget
    }
}

/// Issue d'un enregistrement
enum Delivery {
    Delivered,
    Failed,
    /// Trop de pannes réseau: fin de l'envoi
    Abort,
    Cancelled,
}

/// Envoi en masse d'exemples de feedback vers un modèle
pub struct FeedbackUploader {
    model: Arc<ModelResource>,
    policy: UploadPolicy,
}

impl FeedbackUploader {
    pub fn new(model: Arc<ModelResource>) -> Self {
        Self::with_policy(model, UploadPolicy::default())
    }

    pub fn with_policy(model: Arc<ModelResource>, policy: UploadPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Lit un fichier d'enregistrements, une ligne par exemple
    pub async fn read_records(path: &Path) -> Result<Vec<FeedbackRecord>> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            ClientError::Io(format!("cannot read feedback file {}: {}", path.display(), e))
        })?;
        Ok(FeedbackRecord::parse_records(&text))
    }

    pub async fn upload_file(&self, path: &Path, cancel: CancellationToken) -> Result<UploadReport> {
        let records = Self::read_records(path).await?;
        self.run(records, cancel).await
    }

    /// Lance l'envoi sur sa propre tâche
    pub fn spawn(self, records: Vec<FeedbackRecord>) -> UploadHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(records, token).await });

        UploadHandle { task, cancel }
    }

    /// Envoie les enregistrements un par un
    ///
    /// Le modèle doit être prêt. Les labels du dataset sont figés au départ;
    /// un enregistrement invalide est ignoré sans toucher au budget. Le
    /// dataset est rafraîchi une dernière fois quelle que soit l'issue.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run(
        &self,
        records: Vec<FeedbackRecord>,
        cancel: CancellationToken,
    ) -> Result<UploadReport> {
        let model_id = self
            .model
            .id()
            .await
            .ok_or_else(|| ClientError::Precondition("no model bound for feedback".to_string()))?;
        if !self.model.is_ready().await {
            return Err(ClientError::Precondition(format!(
                "model {} must finish training before feedback upload",
                model_id
            )));
        }

        let labels = self.model.dataset().labels().await;
        let mut report = UploadReport::new(records.len());
        let mut total_latency = Duration::ZERO;

        info!(
            model_id = %model_id,
            labels = labels.len(),
            "🚀 Envoi de {} exemples de feedback",
            records.len()
        );

        for (index, record) in records.iter().enumerate() {
            if index >= self.policy.limit {
                info!("⏹️  Limite de {} enregistrements atteinte", self.policy.limit);
                report.outcome = UploadOutcome::LimitReached;
                break;
            }
            if cancel.is_cancelled() {
                report.outcome = UploadOutcome::Cancelled;
                break;
            }
            if index > 0 && index % self.policy.progress_interval.max(1) == 0 {
                info!(
                    "📊 {}/{} traités, latence moyenne {:?}",
                    index,
                    records.len(),
                    average_duration(total_latency, report.attempted)
                );
            }

            if let Err(e) = record.validate(&labels) {
                warn!("⚠️  Enregistrement {} ignoré: {}", index + 1, e);
                report.skipped += 1;
                continue;
            }

            let started = Instant::now();
            report.attempted += 1;
            let delivery = self.deliver(record, &mut report, &cancel).await;
            total_latency += started.elapsed();

            match delivery {
                Delivery::Delivered => report.succeeded += 1,
                Delivery::Failed => report.failed += 1,
                Delivery::Abort => {
                    report.failed += 1;
                    report.outcome = UploadOutcome::Aborted;
                    break;
                }
                Delivery::Cancelled => {
                    report.failed += 1;
                    report.outcome = UploadOutcome::Cancelled;
                    break;
                }
            }
        }

        report.average_latency = average_duration(total_latency, report.attempted);

        if let Err(e) = self.model.dataset().refresh_status().await {
            error!("❌ Rafraîchissement final du dataset échoué: {}", e);
        }

        info!(
            outcome = ?report.outcome,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            failed_attempts = report.budget.failed_attempts,
            connection_faults = report.budget.connection_faults,
            "✅ Envoi de feedback terminé"
        );
        Ok(report)
    }

    /// Une fois le budget épuisé, un seul essai sans attente entre essais.
    /// La pause de cadence suit tout enregistrement refusé ou accepté, mais
    /// pas une panne réseau, déjà suivie de sa propre attente.
    async fn deliver(
        &self,
        record: &FeedbackRecord,
        report: &mut UploadReport,
        cancel: &CancellationToken,
    ) -> Delivery {
        let single_attempt = self.policy.budget_exhausted(report);
        let mut tries = self.policy.first_try;

        loop {
            let result = self
                .model
                .submit_feedback(&record.document, &record.expected_label)
                .await;

            match result {
                Ok(response) if response.status == StatusCode::OK => {
                    debug!(label = %record.expected_label, tries, "Feedback accepté");
                    self.pace(cancel).await;
                    return Delivery::Delivered;
                }
                Err(e) if e.is_transient() => {
                    report.budget.connection_faults += 1;
                    warn!(
                        "🔌 Panne réseau {}/{}: {}",
                        report.budget.connection_faults,
                        self.policy.max_connection_faults,
                        e
                    );
                    if report.budget.connection_faults > self.policy.max_connection_faults {
                        error!("❌ Trop de pannes réseau, abandon de l'envoi");
                        return Delivery::Abort;
                    }
                    if !pause(self.policy.connection_backoff, cancel).await {
                        return Delivery::Cancelled;
                    }
                    return Delivery::Failed;
                }
                Ok(response) => {
                    report.budget.failed_attempts += 1;
                    debug!(status = response.status_code(), tries, "Feedback refusé");
                }
                Err(e) => {
                    report.budget.failed_attempts += 1;
                    warn!("⚠️  Échec de l'envoi du feedback: {}", e);
                }
            }

            if single_attempt {
                self.pace(cancel).await;
                return Delivery::Failed;
            }

            tries += 1;
            if tries >= self.policy.max_tries || self.policy.budget_exhausted(report) {
                if self.policy.budget_exhausted(report) {
                    warn!(
                        "⚠️  Budget d'erreurs épuisé ({} tentatives échouées)",
                        report.budget.failed_attempts
                    );
                }
                self.pace(cancel).await;
                return Delivery::Failed;
            }

            if !pause(self.policy.retry_delay_unit * tries, cancel).await {
                return Delivery::Cancelled;
            }
        }
    }

    /// Une annulation pendant la pause est vue au tour suivant
    async fn pace(&self, cancel: &CancellationToken) {
        pause(self.policy.pacing_delay, cancel).await;
    }
}

/// Attente interruptible; `false` si l'envoi a été annulé
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Poignée sur un envoi lancé par `FeedbackUploader::spawn`
pub struct UploadHandle {
    task: JoinHandle<Result<UploadReport>>,
    cancel: CancellationToken,
}

impl UploadHandle {
    /// Demande l'arrêt; l'enregistrement en cours se termine d'abord
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<UploadReport> {
        self.task.await?
    }
}
