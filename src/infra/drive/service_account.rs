// =============================================================================
// BEARER TOKENS FOR THE DRIVE API
// =============================================================================
//
// Two ways to authenticate:
//
// 1. **Static token:** the host environment already holds an OAuth access
//    token (`GOOGLE_OAUTH_TOKEN`). We pass it through untouched. Refreshing it
//    is the host's job.
//
// 2. **Service account:** sign a JWT with the service account's private key
//    and trade it for an access token at the token endpoint. With domain-wide
//    delegation, `GOOGLE_IMPERSONATE_USER` makes the token act as that user so
//    the batch sees *their* Drive.
//
// **Environment Variables:**
// - `GOOGLE_OAUTH_TOKEN` - Static bearer token (takes precedence)
// - `GOOGLE_SERVICE_ACCOUNT_KEY` - Path to service account JSON file
// - `GOOGLE_SERVICE_ACCOUNT_JSON` - Service account JSON content (alternative)
// - `GOOGLE_IMPERSONATE_USER` - Optional subject for domain-wide delegation

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::core::conversion::{DriveError, TokenSource};

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// =============================================================================
// STATIC TOKEN
// =============================================================================

/// A token handed to us by the host environment.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<String, DriveError> {
        Ok(self.token.clone())
    }
}

// =============================================================================
// SERVICE ACCOUNT AUTHENTICATION
// =============================================================================

/// Service account credentials from the JSON key file.
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    /// The service account email (used as issuer in JWT).
    client_email: String,

    /// The private key in PEM format.
    private_key: String,

    /// Where to exchange the JWT for an access token.
    token_uri: String,
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    /// Impersonated user, only with domain-wide delegation.
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    iat: u64,
    /// Max 1 hour after `iat`.
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    expires_at: SystemTime,
}

/// Authenticator that handles OAuth2 with service account credentials.
pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    subject: Option<String>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl ServiceAccountAuth {
    pub async fn from_file(path: &str) -> Result<Self, DriveError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DriveError::Auth(format!("Failed to read key file {}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, DriveError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|e| DriveError::Auth(format!("Invalid service account JSON: {}", e)))?;
        Ok(Self {
            credentials,
            subject: None,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Act as `user` (domain-wide delegation).
    pub fn impersonating(mut self, user: Option<String>) -> Self {
        self.subject = user.filter(|u| !u.trim().is_empty());
        self
    }

    /// Returns `Ok(None)` when neither key variable is set.
    pub async fn from_env() -> Result<Option<Self>, DriveError> {
        let auth = if let Ok(path) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            Self::from_file(&path).await?
        } else if let Ok(json) = std::env::var("GOOGLE_SERVICE_ACCOUNT_JSON") {
            Self::from_json(&json)?
        } else {
            return Ok(None);
        };

        Ok(Some(
            auth.impersonating(std::env::var("GOOGLE_IMPERSONATE_USER").ok()),
        ))
    }

    fn claims(&self, now: u64) -> JwtClaims {
        JwtClaims {
            iss: self.credentials.client_email.clone(),
            scope: DRIVE_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            sub: self.subject.clone(),
            iat: now,
            exp: now + 3600,
        }
    }

    async fn fetch_new_token(&self) -> Result<CachedToken, DriveError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| DriveError::Auth(e.to_string()))?
            .as_secs();

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| DriveError::Auth(format!("Invalid private key: {}", e)))?;
        let jwt = encode(&header, &self.claims(now), &key)
            .map_err(|e| DriveError::Auth(format!("Failed to sign JWT: {}", e)))?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await
            .map_err(|e| DriveError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DriveError::Decode(e.to_string()))?;

        tracing::debug!(
            subject = self.subject.as_deref().unwrap_or("-"),
            expires_in = token.expires_in,
            "Fetched Drive access token"
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn bearer_token(&self) -> Result<String, DriveError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_MARGIN {
                    return Ok(token.token.clone());
                }
            }
        }

        let fresh = self.fetch_new_token().await?;
        let token = fresh.token.clone();
        *self.cached_token.write().await = Some(fresh);
        Ok(token)
    }
}
