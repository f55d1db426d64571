// utils/security.rs
use crate::utils::error::{ClientError, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type de grant OAuth pour l'échange d'assertion
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims de l'assertion signée échangée contre un bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssertionClaims {
    pub sub: String, // Email du compte
    pub aud: String, // Endpoint d'autorisation
    pub exp: i64,    // Expiration (timestamp)
}

/// Clé privée PEM utilisée pour signer les assertions
#[derive(Clone)]
pub struct SigningKey {
    pem: String,
}

impl SigningKey {
    pub fn from_pem(pem: impl Into<String>) -> Result<Self> {
        let pem = pem.into();
        // Vérifier la clé dès le chargement plutôt qu'au premier échange
        EncodingKey::from_rsa_pem(pem.as_bytes())?;
        Ok(Self { pem })
    }

    /// Lire la clé depuis un fichier certificat
    pub fn from_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Io(format!("cannot read signing key {}: {}", path.display(), e))
        })?;
        Self::from_pem(pem)
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        Ok(EncodingKey::from_rsa_pem(self.pem.as_bytes())?)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Signer une assertion RS256
pub fn sign_assertion(
    identity: &str,
    audience: &str,
    expires_at: DateTime<Utc>,
    key: &SigningKey,
) -> Result<String> {
    let claims = AssertionClaims {
        sub: identity.to_string(),
        aud: audience.to_string(),
        exp: expires_at.timestamp(),
    };

    let token = encode(&Header::new(Algorithm::RS256), &claims, &key.encoding_key()?)?;
    Ok(token)
}
