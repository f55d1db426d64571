// utils/config.rs
use crate::utils::error::{ClientError, Result};
use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_API_BASE_URL: &str = "https://api.einstein.ai/v2/language";
pub const DEFAULT_AUTH_URL: &str = "https://api.einstein.ai/v2/oauth2/token";

#[derive(Debug, Clone)]
pub struct Config {
    // Points d'accès
    pub api_base_url: String,
    pub auth_url: String,
    pub http_timeout_seconds: u64,

    // Session
    pub account_email: Option<String>,
    pub private_key_path: Option<String>,
    pub access_token: Option<String>,
    pub session_duration_seconds: i64,
    pub token_refresh_margin_seconds: i64,

    // Datasets
    pub dataset_type: String,

    // Envoi de feedback en masse
    pub feedback_upload_limit: usize,
    pub feedback_retry_delay_ms: u64,
    pub feedback_connection_backoff_seconds: u64,
    pub feedback_pacing_ms: u64,
    pub feedback_dataset_id: Option<String>,
    pub feedback_model_id: Option<String>,
    pub feedback_file: Option<String>,

    // Logging
    pub log_level: String,
    pub log_format: String,
}

/// Moyen d'ouvrir une session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Clé privée PEM + email: un nouveau token est émis
    SigningKey { email: String, private_key_path: String },
    /// Token déjà actif, expiration inconnue
    AccessToken(String),
}

/// Envoi de feedback demandé par la configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackJob {
    pub dataset_id: String,
    pub model_id: String,
    pub file: PathBuf,
}

impl Config {
    /// Charger la configuration depuis les variables d'environnement
    pub fn from_env() -> Result<Self> {
        // Charger le fichier .env si présent
        let _ = dotenv().ok();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Construire la configuration depuis une source clé/valeur quelconque
    pub fn from_source<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            api_base_url: lookup("INTENT_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            auth_url: lookup("INTENT_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            http_timeout_seconds: parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", 30)?,

            account_email: lookup("INTENT_ACCOUNT_EMAIL").filter(|v| !v.is_empty()),
            private_key_path: lookup("INTENT_PRIVATE_KEY_PATH").filter(|v| !v.is_empty()),
            access_token: lookup("INTENT_ACCESS_TOKEN").filter(|v| !v.is_empty()),
            session_duration_seconds: parse_or(&lookup, "SESSION_DURATION_SECONDS", 3600)?,
            token_refresh_margin_seconds: parse_or(&lookup, "TOKEN_REFRESH_MARGIN_SECONDS", 60)?,

            dataset_type: lookup("DATASET_TYPE").unwrap_or_else(|| "text-intent".to_string()),

            feedback_upload_limit: parse_or(&lookup, "FEEDBACK_UPLOAD_LIMIT", 1000)?,
            feedback_retry_delay_ms: parse_or(&lookup, "FEEDBACK_RETRY_DELAY_MS", 1000)?,
            feedback_connection_backoff_seconds: parse_or(
                &lookup,
                "FEEDBACK_CONNECTION_BACKOFF_SECONDS",
                120,
            )?,
            feedback_pacing_ms: parse_or(&lookup, "FEEDBACK_PACING_MS", 2000)?,
            feedback_dataset_id: lookup("DATASET_ID").filter(|v| !v.is_empty()),
            feedback_model_id: lookup("MODEL_ID").filter(|v| !v.is_empty()),
            feedback_file: lookup("FEEDBACK_FILE").filter(|v| !v.is_empty()),

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
        };

        if config.session_duration_seconds <= 0 {
            return Err(ClientError::Configuration(
                "SESSION_DURATION_SECONDS must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// Détermine comment ouvrir la session; la clé privée l'emporte sur le token
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.account_email, &self.private_key_path, &self.access_token) {
            (Some(email), Some(path), _) => Ok(Credentials::SigningKey {
                email: email.clone(),
                private_key_path: path.clone(),
            }),
            (_, _, Some(token)) => Ok(Credentials::AccessToken(token.clone())),
            _ => Err(ClientError::Configuration(
                "INTENT_ACCOUNT_EMAIL + INTENT_PRIVATE_KEY_PATH or INTENT_ACCESS_TOKEN is required"
                    .to_string(),
            )),
        }
    }

    /// Envoi à lancer, seulement si dataset, modèle et fichier sont tous fournis
    pub fn feedback_job(&self) -> Option<FeedbackJob> {
        Some(FeedbackJob {
            dataset_id: self.feedback_dataset_id.clone()?,
            model_id: self.feedback_model_id.clone()?,
            file: PathBuf::from(self.feedback_file.as_ref()?),
        })
    }

    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_duration_seconds)
    }

    pub fn token_refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_refresh_margin_seconds)
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_seconds)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::Configuration(format!("{} must be a number", key))),
        None => Ok(default),
    }
}
