use serde::{Deserialize, Serialize};

use super::deserialize_optional_id;

/// Réponse de l'endpoint d'autorisation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    /// Bearer token à présenter sur chaque appel
    pub access_token: String,
    pub token_type: Option<String>,
    /// Durée annoncée par le serveur; non utilisée pour l'expiration locale
    pub expires_in: Option<i64>,
}

/// Consommation de l'API pour un plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsage {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub organization_id: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub license_id: Option<String>,
    #[serde(default)]
    pub plan_data: Vec<PlanData>,
    pub predictions_remaining: Option<i64>,
    pub predictions_used: Option<i64>,
    pub predictions_max: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanData {
    pub plan: Option<String>,
    pub amount: Option<i64>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiUsageList {
    #[serde(default)]
    pub data: Vec<ApiUsage>,
    pub object: Option<String>,
}

impl ApiUsageList {
    /// Prédictions restantes sur l'ensemble des plans connus
    pub fn predictions_remaining(&self) -> Option<i64> {
        self.data
            .iter()
            .filter_map(|usage| usage.predictions_remaining)
            .reduce(|a, b| a + b)
    }
}
