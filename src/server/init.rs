//! Server initialization and main run loop
//!
//! Builds every component from [`AppConfig`], wires them together and runs
//! the HTTP server until a shutdown signal arrives.

use super::config::AppConfig;
use super::loader::load_config;
use super::validation::validate_config;
use crate::api::{health_routes, HealthState};
use crate::websocket::{websocket_router, ChatState};
use anyhow::{Context, Result};
use axum::{Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use wayfarer_core::{
    open_store, wait_for_shutdown_signal, ContentValidator, CredentialRotationManager,
    CredentialsConfig, HttpToolConnectionFactory, MemoryAugmentationStage,
    OAuthClientCredentials, Pipeline, RotationSettings, ScopeClassifier, ScopeStage,
    SessionManager, ShutdownController, ValidationStage,
};
use wayfarer_llm::{ChatModel, OllamaConfig, OllamaProvider};

/// Run the server
pub async fn run() -> Result<()> {
    info!("Starting Wayfarer v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    validate_config(&config)?;
    info!("Configuration loaded");

    let shutdown = ShutdownController::new();

    let credentials = init_credentials(&config.credentials, &shutdown).await?;
    let pipeline = build_pipeline(&config, credentials.clone()).await?;
    info!(stages = ?pipeline.stage_names(), "Pipeline ready");

    let sessions = Arc::new(
        SessionManager::new(Arc::new(pipeline), config.session.clone(), shutdown.token())
            .with_shutdown(shutdown.clone()),
    );

    let chat_state = Arc::new(ChatState {
        manager: sessions.clone(),
        max_frame_bytes: config.server.max_frame_bytes,
        idle_timeout: Duration::from_secs(config.server.idle_timeout_secs),
    });
    let health_state = Arc::new(HealthState {
        sessions: sessions.clone(),
        credentials,
    });

    let app = Router::new()
        .merge(health_routes())
        .merge(websocket_router())
        .layer(Extension(chat_state))
        .layer(Extension(health_state))
        .layer(Extension(Arc::new(config.auth.clone())))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    let server_sessions = sessions.clone();
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            server_sessions.close_all();
            server_shutdown.shutdown().await;
        })
        .await
        .context("HTTP server error")?;

    info!("Wayfarer shutdown complete");
    Ok(())
}

/// Assemble the stage chain around the configured chat model
pub async fn build_pipeline(
    config: &AppConfig,
    tools: Option<Arc<CredentialRotationManager>>,
) -> Result<Pipeline> {
    let model: Arc<dyn ChatModel> = Arc::new(
        OllamaProvider::new(
            OllamaConfig::default()
                .with_base_url(&config.llm.base_url)
                .with_model(&config.llm.model)
                .with_timeout(Duration::from_secs(config.llm.timeout_secs)),
        )
        .context("Failed to create chat model")?,
    );

    let store = open_store(&config.memory)
        .await
        .context("Failed to open conversation store")?;
    info!(backend = %config.memory.backend, "Conversation store ready");

    let validator =
        ContentValidator::new(config.security.clone()).context("Invalid security configuration")?;
    let classifier = ScopeClassifier::new().context("Failed to build scope classifier")?;

    let mut pipeline = Pipeline::new(model, &config.pipeline)
        .with_stage(ValidationStage::new(validator))
        .with_stage(ScopeStage::new(classifier))
        .with_stage(MemoryAugmentationStage::new(
            store,
            config.memory.history_limit,
        ));

    if let Some(prompt) = &config.llm.system_prompt {
        pipeline = pipeline.with_system_prompt(prompt.clone());
    }
    if let Some(manager) = tools {
        pipeline = pipeline.with_tools(manager);
    }

    Ok(pipeline)
}

async fn init_credentials(
    config: &CredentialsConfig,
    shutdown: &Arc<ShutdownController>,
) -> Result<Option<Arc<CredentialRotationManager>>> {
    if !config.enabled {
        info!("Tool credentials disabled");
        return Ok(None);
    }

    let source = OAuthClientCredentials::new(
        &config.token_url,
        &config.client_id,
        config.client_secret.clone().into(),
        config.scope.clone(),
    )
    .context("Failed to create token source")?;

    let manager = Arc::new(CredentialRotationManager::new(
        Arc::new(source),
        Arc::new(HttpToolConnectionFactory::default()),
        config.tools.clone(),
        RotationSettings::from(config),
    ));

    // initial connection set; the background loop retries on failure
    match manager.check_and_rotate().await {
        Ok(_) => info!(tools = config.tools.len(), "Tool connections ready"),
        Err(e) => warn!("Initial tool connection build failed: {}", e),
    }

    let rotation = manager.clone();
    let token = shutdown.token();
    tokio::spawn(async move {
        rotation.run(token).await;
    });

    Ok(Some(manager))
}
