//! Startup configuration validation

use super::config::AppConfig;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject configurations the server cannot run with
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let session = &config.session;
    if session.heartbeat_interval_secs == 0 {
        bail!("session.heartbeat_interval_secs must be greater than zero");
    }
    if session.thinking_interval_secs == 0 {
        bail!("session.thinking_interval_secs must be greater than zero");
    }
    if config.pipeline.model_timeout_secs == 0 {
        bail!("pipeline.model_timeout_secs must be greater than zero");
    }
    if config.server.idle_timeout_secs == 0 {
        bail!("server.idle_timeout_secs must be greater than zero");
    }
    if config.server.idle_timeout_secs <= config.pipeline.model_timeout_secs {
        warn!(
            idle_timeout_secs = config.server.idle_timeout_secs,
            model_timeout_secs = config.pipeline.model_timeout_secs,
            "server.idle_timeout_secs does not exceed pipeline.model_timeout_secs, \
             quiet sockets may be closed during a long model call"
        );
    }
    if config.server.max_frame_bytes == 0 {
        bail!("server.max_frame_bytes must be greater than zero");
    }
    if config.memory.history_limit == 0 {
        warn!("memory.history_limit is 0, prior turns will never reach the model");
    }

    let credentials = &config.credentials;
    if credentials.enabled {
        if credentials.token_url.trim().is_empty() {
            bail!("credentials.token_url is required when credentials are enabled");
        }
        if credentials.check_interval_secs == 0 {
            bail!("credentials.check_interval_secs must be greater than zero");
        }
        if credentials.tools.is_empty() {
            warn!("Credentials enabled but no tools configured");
        }
    }

    let is_production = std::env::var("WAYFARER_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false);
    if is_production && config.server.host == "0.0.0.0" {
        warn!(
            "SECURITY WARNING: Server is binding to all interfaces (0.0.0.0) in production. \
             Identity headers must only be set by the fronting auth proxy."
        );
    }

    Ok(())
}
