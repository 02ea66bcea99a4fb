//! HTTP tool connections
//!
//! Each connection is a reqwest client with the bearer token baked into its
//! default headers. A rotated token means a new client, never a mutated one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;
use wayfarer_llm::{SharedToolTransport, ToolTransport};

use super::{AccessToken, ToolSpec};
use crate::error::{Error, Result};

/// Builds one tool transport from a spec and a token
#[async_trait]
pub trait ToolConnectionFactory: Send + Sync {
    /// Build a transport bound to `token`
    async fn build(&self, spec: &ToolSpec, token: &AccessToken) -> Result<SharedToolTransport>;
}

/// Factory for [`HttpToolTransport`]s
#[derive(Debug, Clone)]
pub struct HttpToolConnectionFactory {
    timeout: Duration,
}

impl HttpToolConnectionFactory {
    /// Create a factory with a per-call timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpToolConnectionFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ToolConnectionFactory for HttpToolConnectionFactory {
    async fn build(&self, spec: &ToolSpec, token: &AccessToken) -> Result<SharedToolTransport> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| Error::Credential("access token is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::Credential(format!("HTTP client error for {}: {}", spec.key, e)))?;

        debug!(tool = %spec.key, endpoint = %spec.endpoint, "Tool connection built");
        Ok(std::sync::Arc::new(HttpToolTransport {
            key: spec.key.clone(),
            endpoint: spec.endpoint.trim_end_matches('/').to_string(),
            client,
        }))
    }
}

/// JSON-over-HTTP tool service connection
pub struct HttpToolTransport {
    key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpToolTransport {
    fn operation_url(&self, operation: &str) -> String {
        format!("{}/{}", self.endpoint, operation.trim_start_matches('/'))
    }
}

#[async_trait]
impl ToolTransport for HttpToolTransport {
    fn key(&self) -> &str {
        &self.key
    }

    async fn call(
        &self,
        subject_id: &str,
        operation: &str,
        arguments: serde_json::Value,
    ) -> wayfarer_llm::Result<serde_json::Value> {
        let body = serde_json::json!({
            "subjectId": subject_id,
            "arguments": arguments,
        });

        let resp = self
            .client
            .post(self.operation_url(operation))
            .json(&body)
            .send()
            .await
            .map_err(|e| wayfarer_llm::Error::Tool(format!("{} request failed: {}", self.key, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(wayfarer_llm::Error::Tool(format!(
                "{} returned HTTP {}",
                self.key, status
            )));
        }

        resp.json()
            .await
            .map_err(|e| wayfarer_llm::Error::Tool(format!("{} returned invalid JSON: {}", self.key, e)))
    }

    async fn close(&self) -> wayfarer_llm::Result<()> {
        debug!(tool = %self.key, "Tool connection released");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
