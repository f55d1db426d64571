use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::utils::error::{ClientError, Result};

/// Délimiteur des enregistrements de feedback
pub const FEEDBACK_DELIMITER: char = ',';

/// Exemple étiqueté à soumettre au modèle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub document: String,
    pub expected_label: String,
}

impl FeedbackRecord {
    pub fn new(document: impl Into<String>, expected_label: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            expected_label: expected_label.into(),
        }
    }

    /// Découpe une ligne: dernier champ = label, les autres rejoints par des espaces.
    /// Les lignes vides donnent `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        let fields: Vec<&str> = line.split(FEEDBACK_DELIMITER).collect();
        let (label, document) = fields.split_last()?;

        Some(Self::new(document.join(" "), *label))
    }

    /// Parse un fichier complet, une ligne par enregistrement
    pub fn parse_records(text: &str) -> Vec<Self> {
        text.lines().filter_map(Self::parse_line).collect()
    }

    /// Vérifie que le label est connu du dataset et que le document n'est pas vide
    pub fn validate(&self, known_labels: &HashSet<String>) -> Result<()> {
        if self.document.trim().is_empty() {
            return Err(ClientError::DataValidation(format!(
                "empty document for label '{}'",
                self.expected_label
            )));
        }

        if !known_labels.contains(&self.expected_label) {
            return Err(ClientError::DataValidation(format!(
                "label '{}' is not one of the dataset labels",
                self.expected_label
            )));
        }

        Ok(())
    }
}

/// Compteurs d'erreurs propres à un envoi, jamais remis à zéro en cours de route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBudget {
    /// Tentatives HTTP non-200, tous enregistrements confondus
    pub failed_attempts: u32,
    /// Pannes réseau sans réponse
    pub connection_faults: u32,
}

/// Raison de fin d'un envoi
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Completed,
    LimitReached,
    /// Trop de pannes réseau
    Aborted,
    Cancelled,
}

/// Bilan structuré d'un envoi de feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub total_records: usize,
    /// Enregistrements passés à au moins une tentative
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Enregistrements invalides, jamais tentés
    pub skipped: usize,
    pub budget: UploadBudget,
    pub outcome: UploadOutcome,
    #[serde(with = "duration_millis")]
    pub average_latency: Duration,
}

impl UploadReport {
    pub fn new(total_records: usize) -> Self {
        Self {
            total_records,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            budget: UploadBudget::default(),
            outcome: UploadOutcome::Completed,
            average_latency: Duration::ZERO,
        }
    }

    pub fn processed(&self) -> usize {
        self.attempted + self.skipped
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
