//! OAuth2 client-credentials token source

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{AccessToken, SecureString};
use crate::error::{Error, Result};

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Produces fresh access tokens
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a new token
    async fn fetch(&self) -> Result<AccessToken>;
}

/// Client-credentials grant against a token endpoint
pub struct OAuthClientCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecureString,
    scope: Option<String>,
}

impl OAuthClientCredentials {
    /// Create a token source
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecureString,
        scope: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Credential(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            scope,
        })
    }
}

#[async_trait]
impl TokenSource for OAuthClientCredentials {
    async fn fetch(&self) -> Result<AccessToken> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose()),
        ];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }

        debug!(token_url = %self.token_url, "Requesting access token");

        let resp = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Credential(format!("Token request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Credential(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Credential(format!(
                "Token request failed (HTTP {}): {}",
                status,
                wayfarer_llm::util::truncate_safe(&body, 200)
            )));
        }

        parse_token_response(&body, Utc::now())
    }
}

/// Parse a token endpoint response issued at `issued_at`
pub(crate) fn parse_token_response(body: &str, issued_at: DateTime<Utc>) -> Result<AccessToken> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Credential(format!("Invalid token response JSON: {}", e)))?;

    let access_token = json["access_token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Credential("Missing access_token in response".to_string()))?;

    let expires_in = json["expires_in"]
        .as_i64()
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    Ok(AccessToken::new(
        access_token,
        issued_at + chrono::Duration::seconds(expires_in),
    ))
}

#[cfg(test)]
mod tests;
