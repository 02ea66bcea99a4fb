//! Wayfarer Core - Conversational session pipeline
//!
//! This crate drives one chat request from an inbound frame to a single
//! terminal envelope:
//! - Session manager: session registry, heartbeat and thinking timers,
//!   ordered per-session writes, bounded worker pool
//! - Pipeline: validation, scope and memory stages around a streaming model
//!   call, with stream aggregation into one final reply
//! - Security: content validation and travel-scope classification
//! - Memory: conversation history stores (in-memory, SQLite)
//! - Credentials: OAuth2 token refresh and build-all-then-swap rotation of
//!   tool connections
//! - Shutdown: cancellation and request draining

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credentials;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod security;
pub mod session_manager;
pub mod shutdown;
pub mod utils;

pub use credentials::{
    AccessToken, CredentialRotationManager, CredentialsConfig, HttpToolConnectionFactory,
    OAuthClientCredentials, RotationSettings, SecureString, TokenSource, TokenState,
    ToolConnection, ToolConnectionFactory, ToolSpec,
};
pub use envelope::{EnvelopeKind, PromptFrame, PromptRequest, ResponseEnvelope};
pub use error::{format_error_for_chat, Error, Result, UserFriendlyError};
pub use memory::{
    open_store, ConversationKey, ConversationStore, ConversationTurn, MemoryAugmentationStage,
    MemoryConfig, MemoryStore, SqliteStore,
};
pub use pipeline::{
    EnvelopeSink, FinalReply, Pipeline, PipelineConfig, PipelineContext, Stage, ToolProvider,
};
pub use security::{
    ContentValidator, ScopeClassifier, ScopeStage, SecurityConfig, ValidationStage,
};
pub use session_manager::{
    Connection, Dispatch, Principal, Session, SessionConfig, SessionManager,
};
pub use shutdown::{wait_for_shutdown_signal, ShutdownController, ShutdownPhase};
