// utils/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    // Erreurs d'authentification
    #[error("Token issuance rejected with status {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("Session expiry is unknown for an externally supplied token")]
    UnknownExpiry,

    #[error("Signing error: {0}")]
    Signing(String),

    // Erreurs d'utilisation
    #[error("Precondition failed: {0}")]
    Precondition(String),

    // Erreurs distantes
    #[error("Remote error {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Transient network fault: {0}")]
    TransientNetwork(String),

    #[error("HTTP error: {0}")]
    Http(String),

    // Erreurs de données
    #[error("Invalid feedback record: {0}")]
    DataValidation(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    // Erreurs système
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upload task failed: {0}")]
    Task(String),
}

impl ClientError {
    /// Vrai pour les pannes réseau sans réponse du serveur (connexion, timeout)
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::TransientNetwork(_))
    }

    /// Vrai pour les erreurs d'usage, qu'on ne retente jamais
    pub fn is_precondition(&self) -> bool {
        matches!(self, ClientError::Precondition(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::TransientNetwork(err.to_string())
        } else if err.is_decode() {
            ClientError::ParseError(err.to_string())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::ParseError(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ClientError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ClientError::Signing(err.to_string())
    }
}

impl From<std::env::VarError> for ClientError {
    fn from(err: std::env::VarError) -> Self {
        ClientError::Configuration(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Task(err.to_string())
    }
}

// Type de résultat standard
pub type Result<T> = std::result::Result<T, ClientError>;
