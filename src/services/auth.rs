// services/auth.rs
use crate::models::TokenResponse;
use crate::utils::config::{Config, Credentials};
use crate::utils::error::{ClientError, Result};
use crate::utils::security::{sign_assertion, SigningKey, JWT_BEARER_GRANT_TYPE};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client as HttpClient, StatusCode};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// État de la session courante
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    /// Durée demandée lors de la dernière émission
    pub duration: Option<Duration>,
    /// Inconnue pour un token fourni de l'extérieur
    pub expires_at: Option<DateTime<Utc>>,
    /// Dernière réponse de l'endpoint d'autorisation
    pub metadata: Option<TokenResponse>,
}

/// Gestionnaire du bearer token: émission, adoption, expiration, renouvellement
///
/// Partagé en `Arc` par toutes les ressources. Seul ce gestionnaire modifie la
/// session, et les renouvellements sont sérialisés par `refresh_lock`.
pub struct TokenManager {
    http_client: HttpClient,
    auth_url: String,
    identity: Option<String>,
    signing_key: Option<SigningKey>,
    default_duration: Duration,
    session: RwLock<Session>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Gestionnaire capable d'émettre des tokens à partir d'une clé privée
    pub fn with_signing_key(
        http_client: HttpClient,
        auth_url: impl Into<String>,
        identity: impl Into<String>,
        signing_key: SigningKey,
        default_duration: Duration,
    ) -> Self {
        Self {
            http_client,
            auth_url: auth_url.into(),
            identity: Some(identity.into()),
            signing_key: Some(signing_key),
            default_duration,
            session: RwLock::new(Session::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Gestionnaire adoptant un token déjà actif (expiration inconnue)
    pub fn with_token(
        http_client: HttpClient,
        auth_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            auth_url: auth_url.into(),
            identity: None,
            signing_key: None,
            default_duration: Duration::hours(1),
            session: RwLock::new(Session {
                token: Some(token.into()),
                ..Session::default()
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Ouvre une session selon la configuration; émet un token si une clé est fournie
    pub async fn from_config(config: &Config) -> Result<Arc<Self>> {
        let http_client = HttpClient::builder().timeout(config.http_timeout()).build()?;

        let manager = match config.credentials()? {
            Credentials::SigningKey {
                email,
                private_key_path,
            } => {
                let signing_key = SigningKey::from_file(Path::new(&private_key_path))?;
                let manager = Self::with_signing_key(
                    http_client,
                    &config.auth_url,
                    email,
                    signing_key,
                    config.session_duration(),
                );
                manager.issue_token(None).await?;
                manager
            }
            Credentials::AccessToken(token) => {
                Self::with_token(http_client, &config.auth_url, token)
            }
        };

        Ok(Arc::new(manager))
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Vrai si une clé de signature permet de renouveler le token
    pub fn can_refresh(&self) -> bool {
        self.identity.is_some() && self.signing_key.is_some()
    }

    /// Échange une assertion signée contre un nouveau bearer token
    ///
    /// L'expiration locale vaut heure de la requête + durée demandée: le
    /// backend ne renvoie pas de durée fiable. En cas de refus, le token
    /// précédent reste en place. Attend la fin d'un renouvellement en cours.
    pub async fn issue_token(&self, duration: Option<Duration>) -> Result<TokenResponse> {
        let _guard = self.refresh_lock.lock().await;
        self.exchange(duration).await
    }

    /// Échange proprement dit; l'appelant tient `refresh_lock`
    async fn exchange(&self, duration: Option<Duration>) -> Result<TokenResponse> {
        let (identity, signing_key) = match (&self.identity, &self.signing_key) {
            (Some(identity), Some(key)) => (identity, key),
            _ => {
                return Err(ClientError::Precondition(
                    "a signing key and an identity are required to issue a token".to_string(),
                ))
            }
        };

        let duration = duration.unwrap_or(self.default_duration);
        let requested_at = Utc::now();
        let expires_at = requested_at + duration;
        let assertion = sign_assertion(identity, &self.auth_url, expires_at, signing_key)?;

        debug!("🔑 Demande d'un token pour {} (durée {}s)", identity, duration.num_seconds());

        let response = self
            .http_client
            .post(&self.auth_url)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            error!("❌ Émission du token refusée: status {}", status);
            return Err(ClientError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;

        let mut session = self.session.write().await;
        *session = Session {
            token: Some(token.access_token.clone()),
            issued_at: Some(requested_at),
            duration: Some(duration),
            expires_at: Some(expires_at),
            metadata: Some(token.clone()),
        };

        info!("✅ Token émis, valide jusqu'à {}", expires_at);
        Ok(token)
    }

    /// Adopte un token fourni par l'appelant; son expiration devient inconnue
    pub async fn use_existing_token(&self, token: impl Into<String>) {
        let mut session = self.session.write().await;
        *session = Session {
            token: Some(token.into()),
            ..Session::default()
        };
        info!("🔑 Session démarrée avec un token existant (expiration inconnue)");
    }

    /// Temps restant avant expiration, négatif une fois expiré
    pub async fn time_remaining(&self) -> Result<Duration> {
        let session = self.session.read().await;
        session
            .expires_at
            .map(|expires_at| expires_at - Utc::now())
            .ok_or(ClientError::UnknownExpiry)
    }

    pub async fn bearer_token(&self) -> Result<String> {
        self.session
            .read()
            .await
            .token
            .clone()
            .ok_or_else(|| ClientError::Precondition("no bearer token in session".to_string()))
    }

    /// `Bearer <token>`; ne vérifie pas l'expiration
    pub async fn authorization_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.bearer_token().await?))
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.read().await.expires_at
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Renouvelle le token s'il expire dans moins de `margin`
    ///
    /// Sans clé de signature, ou pour un token d'expiration inconnue, ne fait
    /// rien. Le test est refait sous verrou pour qu'un seul appelant échange.
    pub async fn refresh_if_expiring(&self, margin: Duration) -> Result<bool> {
        if !self.can_refresh() || !self.needs_refresh(margin).await {
            return Ok(false);
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.needs_refresh(margin).await {
            debug!("Token déjà renouvelé par un autre appel");
            return Ok(false);
        }

        let duration = self.session.read().await.duration;
        self.exchange(duration).await?;
        Ok(true)
    }

    /// Renouvelle après un 401 obtenu avec `stale_token`
    ///
    /// Si un autre appel a déjà remplacé ce token, aucun échange n'est fait.
    pub async fn refresh_after_unauthorized(&self, stale_token: &str) -> Result<bool> {
        if !self.can_refresh() {
            return Ok(false);
        }

        let _guard = self.refresh_lock.lock().await;
        let session = self.session().await;
        if session.token.as_deref() != Some(stale_token) {
            debug!("Token déjà remplacé depuis le 401");
            return Ok(true);
        }

        warn!("🔄 Token refusé par le backend, renouvellement");
        self.exchange(session.duration).await?;
        Ok(true)
    }

    async fn needs_refresh(&self, margin: Duration) -> bool {
        let session = self.session.read().await;
        match (&session.token, session.expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => expires_at - Utc::now() <= margin,
            (Some(_), None) => false,
        }
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("auth_url", &self.auth_url)
            .field("identity", &self.identity)
            .field("can_refresh", &self.can_refresh())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_logging, signing_key, PUBLIC_KEY};
    use crate::utils::security::AssertionClaims;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager(server: &MockServer) -> TokenManager {
        TokenManager::with_signing_key(
            HttpClient::new(),
            format!("{}/oauth2/token", server.uri()),
            "ops@example.com",
            signing_key(),
            Duration::hours(1),
        )
    }

    async fn mount_token(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("jwt-bearer"))
            .and(body_string_contains("assertion="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": token, "token_type": "Bearer"})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_issue_token_stores_token_and_expiry() {
        init_test_logging();
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = manager(&server);

        let before = Utc::now();
        let response = manager.issue_token(None).await.unwrap();

        assert_eq!(response.access_token, "tok-1");
        assert_eq!(manager.authorization_header().await.unwrap(), "Bearer tok-1");

        let expires_at = manager.expires_at().await.unwrap();
        assert!(expires_at >= before + Duration::hours(1));
        assert!(expires_at <= Utc::now() + Duration::hours(1));

        let remaining = manager.time_remaining().await.unwrap();
        assert!(remaining <= Duration::hours(1));
        assert!(remaining > Duration::minutes(59));

        let session = manager.session().await;
        assert_eq!(session.metadata.unwrap().token_type.as_deref(), Some("Bearer"));
        assert_eq!(session.duration, Some(Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_assertion_is_signed_for_identity_and_audience() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = manager(&server);
        manager.issue_token(Some(Duration::minutes(10))).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let assertion = body
            .split('&')
            .find_map(|pair| pair.strip_prefix("assertion="))
            .unwrap();

        let audience = format!("{}/oauth2/token", server.uri());
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience.as_str()]);
        let claims = decode::<AssertionClaims>(
            assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims.sub, "ops@example.com");
        assert_eq!(claims.aud, audience);
        assert_eq!(Some(claims.exp), manager.expires_at().await.map(|e| e.timestamp()));
    }

    #[tokio::test]
    async fn test_rejected_issue_keeps_previous_token() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = manager(&server);
        manager.issue_token(None).await.unwrap();

        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid JWT audience"})),
            )
            .mount(&server)
            .await;

        match manager.issue_token(None).await {
            Err(ClientError::Auth { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid JWT audience"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(manager.authorization_header().await.unwrap(), "Bearer tok-1");
    }

    #[tokio::test]
    async fn test_existing_token_has_unknown_expiry() {
        let manager = TokenManager::with_token(HttpClient::new(), "http://localhost/token", "abc");

        assert_eq!(manager.authorization_header().await.unwrap(), "Bearer abc");
        assert!(matches!(manager.time_remaining().await, Err(ClientError::UnknownExpiry)));
        assert!(!manager.can_refresh());
        assert!(matches!(
            manager.issue_token(None).await,
            Err(ClientError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_adopting_token_drops_known_expiry() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = manager(&server);
        manager.issue_token(None).await.unwrap();
        assert!(manager.time_remaining().await.is_ok());

        manager.use_existing_token("external").await;
        assert_eq!(manager.authorization_header().await.unwrap(), "Bearer external");
        assert!(matches!(manager.time_remaining().await, Err(ClientError::UnknownExpiry)));
    }

    #[tokio::test]
    async fn test_time_remaining_decreases() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = manager(&server);
        manager.issue_token(None).await.unwrap();

        let first = manager.time_remaining().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = manager.time_remaining().await.unwrap();
        assert!(second < first);
    }

    #[tokio::test]
    async fn test_missing_token_header_is_precondition() {
        let server = MockServer::start().await;
        let manager = manager(&server);
        assert!(matches!(
            manager.authorization_header().await,
            Err(ClientError::Precondition(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_issue_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;
        let manager = manager(&server);

        let margin = Duration::seconds(60);
        let (a, b) = tokio::join!(
            manager.refresh_if_expiring(margin),
            manager.refresh_if_expiring(margin)
        );

        assert_eq!(a.unwrap() as u8 + b.unwrap() as u8, 1);
        assert_eq!(manager.bearer_token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_issue_token_waits_for_refresh_in_progress() {
        let server = MockServer::start().await;
        mount_token(&server, "tok-1").await;
        let manager = Arc::new(manager(&server));

        let guard = manager.refresh_lock.lock().await;
        let issuing = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.issue_token(None).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!issuing.is_finished());
        assert!(server.received_requests().await.unwrap().is_empty());

        drop(guard);
        let token = issuing.await.unwrap().unwrap();
        assert_eq!(token.access_token, "tok-1");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_skipped_while_far_from_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;
        let manager = manager(&server);
        manager.issue_token(None).await.unwrap();

        assert!(!manager.refresh_if_expiring(Duration::seconds(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_after_unauthorized_skips_already_replaced_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
            .expect(1)
            .mount(&server)
            .await;
        let manager = manager(&server);

        // Premier 401 sur le token courant: échange
        manager.use_existing_token("tok-1").await;
        assert!(manager.refresh_after_unauthorized("tok-1").await.unwrap());
        assert_eq!(manager.bearer_token().await.unwrap(), "tok-2");

        // Un second 401 sur l'ancien token ne déclenche rien
        assert!(manager.refresh_after_unauthorized("tok-1").await.unwrap());
    }
}
