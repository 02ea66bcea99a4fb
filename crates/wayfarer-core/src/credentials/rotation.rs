//! Credential rotation manager

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wayfarer_llm::SharedToolTransport;

use super::{
    AccessToken, CredentialsConfig, TokenSource, TokenState, ToolConnection,
    ToolConnectionFactory, ToolSpec,
};
use crate::error::{Error, Result};
use crate::pipeline::ToolProvider;
use crate::utils::{retry_with_backoff, RetryConfig};

/// Timing knobs for the manager
#[derive(Debug, Clone, PartialEq)]
pub struct RotationSettings {
    /// Refresh on `get_token` once less than this remains
    pub refresh_margin: Duration,
    /// Rotate connections once less than this remains
    pub rotation_threshold: Duration,
    /// Background check period
    pub check_interval: Duration,
    /// Refresh retry policy
    pub retry: RetryConfig,
}

impl From<&CredentialsConfig> for RotationSettings {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            refresh_margin: Duration::from_secs(config.refresh_margin_secs),
            rotation_threshold: Duration::from_secs(config.rotation_threshold_secs),
            check_interval: Duration::from_secs(config.check_interval_secs),
            retry: RetryConfig::default().with_max_attempts(config.refresh_attempts),
        }
    }
}

/// Owns the current token and the tool connection set built from it
pub struct CredentialRotationManager {
    source: Arc<dyn TokenSource>,
    factory: Arc<dyn ToolConnectionFactory>,
    specs: Vec<ToolSpec>,
    settings: RotationSettings,
    token: tokio::sync::Mutex<Option<AccessToken>>,
    connections: Mutex<Arc<[ToolConnection]>>,
    rotations: AtomicU64,
}

impl CredentialRotationManager {
    /// Create a manager with no token and no connections yet
    #[must_use]
    pub fn new(
        source: Arc<dyn TokenSource>,
        factory: Arc<dyn ToolConnectionFactory>,
        specs: Vec<ToolSpec>,
        settings: RotationSettings,
    ) -> Self {
        Self {
            source,
            factory,
            specs,
            settings,
            token: tokio::sync::Mutex::new(None),
            connections: Mutex::new(Arc::from(Vec::new())),
            rotations: AtomicU64::new(0),
        }
    }

    /// Current token, refreshed first when missing or inside the margin
    ///
    /// Concurrent callers share one refresh.
    pub async fn get_token(&self) -> Result<AccessToken> {
        let mut current = self.token.lock().await;

        if let Some(token) = current.as_ref() {
            if token.is_usable(Utc::now(), chrono_duration(self.settings.refresh_margin)) {
                return Ok(token.clone());
            }
            debug!(expires_at = %token.expires_at(), "Token inside refresh margin");
        }

        let fresh = self.fetch_with_retry().await?;
        *current = Some(fresh.clone());
        Ok(fresh)
    }

    /// State of the current token; `Expired` when there is none
    pub async fn state(&self) -> TokenState {
        self.token
            .lock()
            .await
            .as_ref()
            .map_or(TokenState::Expired, |t| {
                t.state(Utc::now(), chrono_duration(self.settings.rotation_threshold))
            })
    }

    /// State of the live connection set, judged by the token it was built
    /// with; `get_token` can refresh the token without rebuilding the set
    #[must_use]
    pub fn connections_state(&self) -> TokenState {
        let threshold = chrono_duration(self.settings.rotation_threshold);
        let oldest = self.lock_connections().iter().map(|c| c.token_expires_at).min();
        match oldest {
            Some(expires_at) => TokenState::at(expires_at, Utc::now(), threshold),
            None if self.specs.is_empty() => TokenState::Valid,
            None => TokenState::Expired,
        }
    }

    /// Rotate when the token or the connection set is expiring, expired
    /// or missing
    ///
    /// Returns whether a rotation happened.
    pub async fn check_and_rotate(&self) -> Result<bool> {
        let token_state = self.state().await;
        let connections_state = self.connections_state();
        if token_state == TokenState::Valid && connections_state == TokenState::Valid {
            debug!("Token and connections valid, no rotation");
            return Ok(false);
        }

        info!(token = ?token_state, connections = ?connections_state, "Rotating credentials");
        let mut current = self.token.lock().await;
        let threshold = chrono_duration(self.settings.rotation_threshold);
        let fresh = match current.as_ref() {
            Some(token) if token.state(Utc::now(), threshold) == TokenState::Valid => token.clone(),
            _ => self.fetch_with_retry().await?,
        };

        // the token is only committed together with a complete connection set
        self.rotate_with(&fresh).await?;
        *current = Some(fresh);
        Ok(true)
    }

    /// Build a complete connection set for `token`
    ///
    /// On any failure the connections built so far are closed and the error
    /// is returned.
    pub async fn build_all_clients(&self, token: &AccessToken) -> Result<Vec<ToolConnection>> {
        let mut built: Vec<ToolConnection> = Vec::with_capacity(self.specs.len());

        for spec in &self.specs {
            match self.factory.build(spec, token).await {
                Ok(transport) => built.push(ToolConnection {
                    key: spec.key.clone(),
                    transport,
                    token_expires_at: token.expires_at(),
                }),
                Err(e) => {
                    close_all(&built).await;
                    return Err(Error::Credential(format!(
                        "failed to build tool connection '{}': {}",
                        spec.key, e
                    )));
                }
            }
        }

        Ok(built)
    }

    /// Snapshot of the current connection set
    #[must_use]
    pub fn connections(&self) -> Arc<[ToolConnection]> {
        self.lock_connections().clone()
    }

    /// Number of completed rotations
    #[must_use]
    pub fn rotation_count(&self) -> u64 {
        self.rotations.load(Ordering::SeqCst)
    }

    /// Check on a fixed interval until `shutdown` fires, then close the set
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            interval_secs = self.settings.check_interval.as_secs(),
            tools = self.specs.len(),
            "Credential rotation loop started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.check_interval) => {
                    if let Err(e) = self.check_and_rotate().await {
                        error!("Credential rotation failed: {}", e);
                    }
                }
            }
        }

        let current = self.connections();
        close_all(&current).await;
        info!("Credential rotation loop stopped");
    }

    async fn rotate_with(&self, token: &AccessToken) -> Result<()> {
        let fresh = match self.build_all_clients(token).await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!("Keeping previous tool connections: {}", e);
                return Err(e);
            }
        };

        let old = {
            let mut current = self.lock_connections();
            std::mem::replace(&mut *current, Arc::from(fresh))
        };
        let rotations = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            rotations,
            connections = self.specs.len(),
            expires_at = %token.expires_at(),
            "Tool connections swapped"
        );

        close_all(&old).await;
        Ok(())
    }

    async fn fetch_with_retry(&self) -> Result<AccessToken> {
        retry_with_backoff(&self.settings.retry, || self.source.fetch(), |_: &Error| true)
            .await
            .map_err(|e| Error::Credential(e.to_string()))
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, Arc<[ToolConnection]>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ToolProvider for CredentialRotationManager {
    fn tools(&self) -> Vec<SharedToolTransport> {
        self.connections()
            .iter()
            .map(|c| c.transport.clone())
            .collect()
    }
}

async fn close_all(connections: &[ToolConnection]) {
    for connection in connections {
        if let Err(e) = connection.transport.close().await {
            warn!(tool = %connection.key, "Failed to close tool connection: {}", e);
        }
    }
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests;
