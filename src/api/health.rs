//! Health check endpoint
//!
//! `/health` reports liveness plus the live session and tool connection
//! counts.

use std::sync::Arc;

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use wayfarer_core::{CredentialRotationManager, SessionManager};

/// What `/health` reads from
pub struct HealthState {
    pub sessions: Arc<SessionManager>,
    pub credentials: Option<Arc<CredentialRotationManager>>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
    pub tool_connections: usize,
}

/// Health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

async fn health_check(Extension(state): Extension<Arc<HealthState>>) -> Json<HealthResponse> {
    let tool_connections = state
        .credentials
        .as_ref()
        .map_or(0, |c| c.connections().len());

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.session_count(),
        tool_connections,
    })
}
