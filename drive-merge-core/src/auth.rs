//! Credential providers.
//!
//! The pipeline never talks to an interactive OAuth flow; it receives a
//! [`CredentialProvider`] and asks it for a bearer token. [`TokenFile`]
//! implements the stored-authorized-user strategy: read the cached token,
//! refresh it against the token endpoint when expired, persist the result.
//! A missing or unrefreshable token is a hard [`AuthError`], which suits
//! CI-triggered runs where re-authentication cannot happen.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::{AuthError, CredentialProvider};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Tokens this close to expiry are refreshed pre-emptively.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Stored authorized-user token, in the layout the Google OAuth tooling
/// writes to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    expiry: Option<String>,
    #[serde(default)]
    scopes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// True when the stored access token can still be used as-is.
fn is_fresh(expiry: Option<&str>, now: DateTime<Utc>) -> bool {
    match expiry {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(expiry) => {
                expiry.with_timezone(&Utc) - Duration::seconds(EXPIRY_SKEW_SECONDS) > now
            }
            // Unparsable expiry: treat as stale and refresh.
            Err(_) => false,
        },
        None => false,
    }
}

/// File-backed credential provider with refresh-on-expiry.
pub struct TokenFile {
    path: PathBuf,
    http: reqwest::Client,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenFile {
            path: path.into(),
            http: reqwest::Client::new(),
        }
    }

    fn read(&self) -> Result<StoredToken, AuthError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            AuthError::TokenFile(format!("cannot read {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AuthError::TokenFile(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn write_back(&self, token: &StoredToken) {
        // Persisting the refreshed token is best-effort; the run proceeds
        // with the in-memory token either way.
        match serde_json::to_string_pretty(token) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!(path = %self.path.display(), error = %e, "failed to persist refreshed token");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize refreshed token"),
        }
    }

    async fn refresh(&self, stored: &mut StoredToken) -> Result<String, AuthError> {
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or_else(|| AuthError::TokenFile("no refresh_token in token file".to_string()))?;
        let client_id = stored
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::TokenFile("no client_id in token file".to_string()))?;
        let client_secret = stored
            .client_secret
            .as_deref()
            .ok_or_else(|| AuthError::TokenFile("no client_secret in token file".to_string()))?;
        let token_uri = stored.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);

        info!(token_uri, "refreshing access token");
        let resp = self
            .http
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Refresh(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("status {status}: {body}")));
        }
        let refreshed: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("decode response: {e}")))?;

        stored.token = Some(refreshed.access_token.clone());
        stored.expiry = refreshed
            .expires_in
            .map(|secs| (Utc::now() + Duration::seconds(secs)).to_rfc3339());
        self.write_back(stored);
        Ok(refreshed.access_token)
    }
}

#[async_trait]
impl CredentialProvider for TokenFile {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut stored = self.read()?;
        if let Some(token) = &stored.token {
            if is_fresh(stored.expiry.as_deref(), Utc::now()) {
                debug!("using cached access token");
                return Ok(token.clone());
            }
        }
        self.refresh(&mut stored).await
    }
}

/// Fixed pre-issued token, for tests and short-lived environments.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}
