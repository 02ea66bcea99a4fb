//! Session Lifecycle Manager
//!
//! Owns the registry of live sessions and drives each request from an
//! inbound frame to its terminal envelope:
//! - `on_open`: register the session and start its heartbeat
//! - `on_message`: parse, authenticate, acknowledge and dispatch
//! - `on_close`: cancel every timer and release the session

mod session;
#[cfg(test)]
pub(crate) mod testing;
mod timers;
mod worker_pool;

pub use session::{Connection, Principal, Session};
pub use timers::{TimerCallback, TimerHandle, TimerKey, TimerService};
pub use worker_pool::WorkerPool;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::envelope::{status, EnvelopeKind, PromptFrame, PromptRequest, ResponseEnvelope};
use crate::error::{format_error_for_chat, Error, POLICY_VIOLATION_CLOSE_CODE};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::shutdown::ShutdownController;
use session::ThinkingGuard;

/// Session timing and concurrency settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between keep-alive envelopes
    pub heartbeat_interval_secs: u64,
    /// Seconds before the first keep-alive
    pub heartbeat_initial_delay_secs: u64,
    /// Seconds between "thinking" notices for a running request
    pub thinking_interval_secs: u64,
    /// Concurrent pipelines; `0` means available parallelism
    pub worker_pool_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            heartbeat_initial_delay_secs: 30,
            thinking_interval_secs: 5,
            worker_pool_size: 0,
        }
    }
}

/// Outcome of handling one inbound frame
#[derive(Debug)]
pub enum Dispatch {
    /// Answered with an ERROR envelope, nothing dispatched
    Rejected(Error),
    /// Pipeline submitted to the worker pool
    Dispatched(JoinHandle<()>),
}

impl Dispatch {
    /// Whether the frame was dispatched
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Dispatched(_))
    }
}

/// Registry and request driver for all sessions
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    timers: TimerService,
    config: SessionConfig,
    shutdown: Option<Arc<ShutdownController>>,
}

impl SessionManager {
    /// Create a manager; spawns the timer task
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, config: SessionConfig, shutdown: CancellationToken) -> Self {
        let pool = WorkerPool::new(config.worker_pool_size);
        info!(workers = pool.size(), "Session manager started");

        Self {
            sessions: DashMap::new(),
            pipeline,
            pool,
            timers: TimerService::spawn(shutdown),
            config,
            shutdown: None,
        }
    }

    /// Track in-flight requests with `controller` and refuse new ones once
    /// it starts draining
    #[must_use]
    pub fn with_shutdown(mut self, controller: Arc<ShutdownController>) -> Self {
        self.shutdown = Some(controller);
        self
    }

    /// Register a new connection
    pub fn on_open(&self, conn: Arc<dyn Connection>, principal: Principal) -> Arc<Session> {
        let session = Arc::new(Session::new(Uuid::new_v4().to_string(), principal, conn));

        let weak = Arc::downgrade(&session);
        let callback: TimerCallback = Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(session) = weak.upgrade() {
                    let user_id = session.principal().display_name.clone();
                    session.send(ResponseEnvelope::heartbeat(user_id.as_deref())).await;
                }
            })
        });
        let heartbeat = self.timers.schedule(
            TimerKey::Heartbeat {
                session_id: session.id().to_string(),
            },
            Duration::from_secs(self.config.heartbeat_initial_delay_secs),
            Duration::from_secs(self.config.heartbeat_interval_secs),
            callback,
        );
        session.set_heartbeat(heartbeat);

        self.sessions.insert(session.id().to_string(), session.clone());
        info!(
            session_id = %session.id(),
            principal = ?session.principal().display_name,
            sessions = self.sessions.len(),
            "Session opened"
        );
        session
    }

    /// Handle one inbound text frame
    pub async fn on_message(&self, session: &Arc<Session>, raw: &str) -> Dispatch {
        let frame = match PromptFrame::parse(raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(session_id = %session.id(), "Unparseable frame: {}", err);
                return reject(session, client_request_id(raw), err).await;
            }
        };

        let principal = session.principal();
        let Some(user_id) = non_blank(principal.display_name.as_deref()) else {
            warn!(session_id = %session.id(), "Prompt without display principal");
            let err = Error::Auth("missing display principal".to_string());
            return reject(session, frame.request_id, err).await;
        };
        let Some(subject_id) = non_blank(principal.subject_id.as_deref()) else {
            warn!(session_id = %session.id(), "Prompt without authorization subject, closing");
            let err = Error::Auth("missing authorization subject".to_string());
            let dispatch = reject(session, frame.request_id, err).await;
            session
                .close_connection(POLICY_VIOLATION_CLOSE_CODE, "Authentication required")
                .await;
            self.on_close(session.id());
            return dispatch;
        };

        if frame.message.trim().is_empty() {
            return reject(session, frame.request_id, Error::EmptyMessage).await;
        }

        if let Some(controller) = &self.shutdown {
            if !controller.is_accepting_work() {
                let err = Error::Internal("server is shutting down".to_string());
                return reject(session, frame.request_id, err).await;
            }
        }

        let request = frame.into_request();
        if !session.accept_request(&request.request_id) {
            warn!(session_id = %session.id(), request_id = %request.request_id, "Duplicate request id");
            let err = Error::Parse(format!("duplicate requestId {}", request.request_id));
            return reject(session, None, err).await;
        }

        let user_id = user_id.to_string();
        let ctx = PipelineContext::new(request.clone(), user_id.clone(), subject_id);

        session
            .send(
                ResponseEnvelope::for_request(EnvelopeKind::Processing, &request, &user_id)
                    .with_status(status::PROCESSING),
            )
            .await;

        let thinking = self.timers.schedule(
            TimerKey::Thinking {
                session_id: session.id().to_string(),
                request_id: request.request_id.clone(),
            },
            Duration::from_secs(self.config.thinking_interval_secs),
            Duration::from_secs(self.config.thinking_interval_secs),
            thinking_callback(session, request.clone(), user_id.clone(), ctx.started_at),
        );
        session.track_thinking(&request.request_id, thinking);

        let guard = ThinkingGuard {
            session: session.clone(),
            request_id: request.request_id.clone(),
        };
        let in_flight = self.shutdown.as_ref().map(|c| c.register_task());
        let pipeline = self.pipeline.clone();
        let session = session.clone();

        info!(
            session_id = %session.id(),
            request_id = %request.request_id,
            conversation_id = %request.conversation_id,
            "Request dispatched"
        );

        let handle = self.pool.submit(async move {
            let outcome = AssertUnwindSafe(pipeline.execute(ctx, &*session))
                .catch_unwind()
                .await;

            let terminal = outcome.unwrap_or_else(|_| {
                error!(request_id = %request.request_id, "Pipeline panicked");
                let err = Error::Internal("pipeline panicked".to_string());
                ResponseEnvelope::for_request(EnvelopeKind::Error, &request, &user_id)
                    .with_error(format_error_for_chat(&err))
                    .with_status(err.code())
            });

            drop(guard);
            session.send(terminal).await;
            drop(in_flight);
        });

        Dispatch::Dispatched(handle)
    }

    /// Release a session and cancel its timers; repeated calls are no-ops
    pub fn on_close(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            let pending = session.pending_requests().len();
            session.shutdown();
            info!(
                session_id = %session_id,
                pending,
                sessions = self.sessions.len(),
                "Session closed"
            );
        }
    }

    /// Number of live sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Look up a live session
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| Arc::clone(s.value()))
    }

    /// Timer service shared by all sessions
    #[must_use]
    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Stop accepting work and close every session
    pub fn close_all(&self) {
        self.pool.close();
        let ids: Vec<String> = self.sessions.iter().map(|s| s.key().clone()).collect();
        for id in ids {
            self.on_close(&id);
        }
    }
}

async fn reject(session: &Session, request_id: Option<String>, err: Error) -> Dispatch {
    session
        .send(ResponseEnvelope::rejection(
            request_id,
            format_error_for_chat(&err),
            err.code(),
        ))
        .await;
    Dispatch::Rejected(err)
}

fn thinking_callback(
    session: &Arc<Session>,
    request: PromptRequest,
    user_id: String,
    started_at: Instant,
) -> TimerCallback {
    let weak = Arc::downgrade(session);
    Arc::new(move || {
        let weak = weak.clone();
        let request = request.clone();
        let user_id = user_id.clone();
        Box::pin(async move {
            if let Some(session) = weak.upgrade() {
                let envelope = ResponseEnvelope::for_request(EnvelopeKind::Processing, &request, &user_id)
                    .with_status(status::THINKING)
                    .with_elapsed(started_at.elapsed());
                session.send(envelope).await;
            }
        })
    })
}

/// Best-effort requestId from a frame that failed to parse
fn client_request_id(raw: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()?
        .get("requestId")?
        .as_str()
        .map(str::to_string)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
