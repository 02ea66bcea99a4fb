//! Live sessions and their single writer

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::timers::TimerHandle;
use crate::envelope::ResponseEnvelope;
use crate::error::Result;
use crate::pipeline::EnvelopeSink;

/// Outbound side of a client connection
#[async_trait]
pub trait Connection: Send + Sync {
    /// Transport-level connection id
    fn id(&self) -> &str;

    /// Whether the transport still accepts writes
    fn is_open(&self) -> bool;

    /// Write one text frame
    async fn send_text(&self, text: String) -> Result<()>;

    /// Close with a WebSocket close code
    async fn close(&self, code: u16, reason: &str) -> Result<()>;
}

/// Identity resolved by the transport at connect time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// Display principal, used to partition conversations
    pub display_name: Option<String>,
    /// Authorization subject, forwarded to tool calls
    pub subject_id: Option<String>,
}

impl Principal {
    /// Principal with both identities present
    #[must_use]
    pub fn new(display_name: impl Into<String>, subject_id: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            subject_id: Some(subject_id.into()),
        }
    }

    /// Principal with no identity at all
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Request ids remembered per session, for both duplicate detection and
/// the after-terminal write guard
pub(super) const RECENT_REQUEST_WINDOW: usize = 1024;

/// Bounded set of the most recently inserted ids
#[derive(Debug)]
pub(super) struct RecentIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl RecentIds {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            ids: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// `false` when the id is already in the window
    pub(super) fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    pub(super) fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.order.len()
    }
}

struct WriterState {
    terminated: RecentIds,
}

/// One client session
///
/// All writes go through [`Session::send`], which holds an async lock for
/// the duration of the write so frames never interleave. Once a terminal
/// envelope has been written for a request, later envelopes for that
/// request are dropped.
pub struct Session {
    id: String,
    principal: Principal,
    conn: Arc<dyn Connection>,
    opened_at: DateTime<Utc>,
    open: AtomicBool,
    writer: tokio::sync::Mutex<WriterState>,
    accepted: Mutex<RecentIds>,
    heartbeat: Mutex<Option<TimerHandle>>,
    thinking: Mutex<HashMap<String, TimerHandle>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("connection", &self.conn.id())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Session {
    pub(super) fn new(id: String, principal: Principal, conn: Arc<dyn Connection>) -> Self {
        Self {
            id,
            principal,
            conn,
            opened_at: Utc::now(),
            open: AtomicBool::new(true),
            writer: tokio::sync::Mutex::new(WriterState {
                terminated: RecentIds::new(RECENT_REQUEST_WINDOW),
            }),
            accepted: Mutex::new(RecentIds::new(RECENT_REQUEST_WINDOW)),
            heartbeat: Mutex::new(None),
            thinking: Mutex::new(HashMap::new()),
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Principal resolved at connect time
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// When the session was opened
    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Whether the session is open and its transport still writable
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.conn.is_open()
    }

    /// Request ids with a live thinking timer
    #[must_use]
    pub fn pending_requests(&self) -> Vec<String> {
        lock(&self.thinking).keys().cloned().collect()
    }

    /// Write one envelope; never fails
    pub async fn send(&self, envelope: ResponseEnvelope) {
        let mut writer = self.writer.lock().await;

        if !self.is_open() {
            debug!(session_id = %self.id, kind = ?envelope.kind, "Session closed, envelope dropped");
            return;
        }

        if let Some(request_id) = envelope.request_id.as_deref() {
            if writer.terminated.contains(request_id) {
                debug!(
                    session_id = %self.id,
                    request_id = %request_id,
                    kind = ?envelope.kind,
                    "Request already terminated, envelope dropped"
                );
                return;
            }
            if envelope.is_terminal() {
                writer.terminated.insert(request_id);
            }
        }

        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %self.id, "Failed to serialize envelope: {}", e);
                return;
            }
        };

        if let Err(e) = self.conn.send_text(text).await {
            warn!(session_id = %self.id, kind = ?envelope.kind, "Write failed: {}", e);
        }
    }

    /// Close the transport with a code
    pub async fn close_connection(&self, code: u16, reason: &str) {
        self.open.store(false, Ordering::SeqCst);
        if let Err(e) = self.conn.close(code, reason).await {
            debug!(session_id = %self.id, "Close failed: {}", e);
        }
    }

    /// Record a request id; `false` when it was seen recently
    pub(super) fn accept_request(&self, request_id: &str) -> bool {
        lock(&self.accepted).insert(request_id)
    }

    pub(super) fn set_heartbeat(&self, handle: TimerHandle) {
        *lock(&self.heartbeat) = Some(handle);
    }

    pub(super) fn track_thinking(&self, request_id: &str, handle: TimerHandle) {
        lock(&self.thinking).insert(request_id.to_string(), handle);
    }

    pub(super) fn stop_thinking(&self, request_id: &str) {
        lock(&self.thinking).remove(request_id);
    }

    /// Mark closed and cancel every timer
    pub(super) fn shutdown(&self) {
        self.open.store(false, Ordering::SeqCst);
        lock(&self.heartbeat).take();
        lock(&self.thinking).clear();
    }
}

#[async_trait]
impl EnvelopeSink for Session {
    async fn emit(&self, envelope: ResponseEnvelope) {
        self.send(envelope).await;
    }
}

/// Removes a request's thinking timer when dropped, including on unwind
pub(super) struct ThinkingGuard {
    pub(super) session: Arc<Session>,
    pub(super) request_id: String,
}

impl Drop for ThinkingGuard {
    fn drop(&mut self) {
        self.session.stop_thinking(&self.request_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
