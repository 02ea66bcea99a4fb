//! Credential rotation for downstream tool connections
//!
//! This module keeps the tool connection set bound to a fresh token:
//! - `TokenSource`: where tokens come from (OAuth2 client credentials)
//! - `ToolConnectionFactory`: how a connection is built from a token
//! - `CredentialRotationManager`: single-flight refresh, build-all-then-swap
//!   rotation and the background check loop

mod http_tools;
mod oauth;
mod rotation;
mod secure_string;
mod token;

pub use http_tools::{HttpToolConnectionFactory, HttpToolTransport, ToolConnectionFactory};
#[cfg(test)]
pub use oauth::MockTokenSource;
pub use oauth::{OAuthClientCredentials, TokenSource};
pub use rotation::{CredentialRotationManager, RotationSettings};
pub use secure_string::SecureString;
pub use token::{AccessToken, TokenState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfarer_llm::SharedToolTransport;

/// A configured tool service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Logical key
    pub key: String,
    /// Base URL
    pub endpoint: String,
}

/// A live tool connection and the credential it was built with
#[derive(Clone)]
pub struct ToolConnection {
    /// Logical key
    pub key: String,
    /// Transport handle
    pub transport: SharedToolTransport,
    /// Expiry of the token the transport was built with
    pub token_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for ToolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolConnection")
            .field("key", &self.key)
            .field("token_expires_at", &self.token_expires_at)
            .finish()
    }
}

/// Credential and tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Whether tool connections are managed at all
    pub enabled: bool,
    /// OAuth2 token endpoint
    pub token_url: String,
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Requested scope
    pub scope: Option<String>,
    /// Refresh this long before expiry when a token is requested
    pub refresh_margin_secs: u64,
    /// Rotate connections once less than this remains
    pub rotation_threshold_secs: u64,
    /// Seconds between background checks
    pub check_interval_secs: u64,
    /// Attempts per token refresh
    pub refresh_attempts: u32,
    /// Tool services to connect
    pub tools: Vec<ToolSpec>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: None,
            refresh_margin_secs: 60,
            rotation_threshold_secs: 300,
            check_interval_secs: 60,
            refresh_attempts: 3,
            tools: Vec::new(),
        }
    }
}
