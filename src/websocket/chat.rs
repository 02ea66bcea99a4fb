//! Chat WebSocket handler
//!
//! Bridges one axum WebSocket to one [`Session`]. Outbound frames go through
//! an internal channel to a dedicated writer task, so the session manager's
//! writer never touches the socket directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wayfarer_core::{Connection, Principal, Session, SessionManager};

use crate::middleware::auth::ResolvedIdentity;

/// Close code sent when a socket has been silent for too long
const IDLE_CLOSE_CODE: u16 = 1000;

/// Shared state for the chat route
pub struct ChatState {
    pub manager: Arc<SessionManager>,
    pub max_frame_bytes: usize,
    pub idle_timeout: Duration,
}

/// WebSocket upgrade handler
pub async fn chat_handler(
    ResolvedIdentity(principal): ResolvedIdentity,
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<ChatState>>,
) -> impl IntoResponse {
    ws.max_frame_size(state.max_frame_bytes)
        .max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state, principal))
}

/// Outbound half of a chat socket
pub struct WsConnection {
    id: String,
    open: AtomicBool,
    tx: mpsc::UnboundedSender<Message>,
}

impl WsConnection {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            open: AtomicBool::new(true),
            tx,
        }
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    async fn send_text(&self, text: String) -> wayfarer_core::Result<()> {
        if !self.is_open() {
            return Err(wayfarer_core::Error::Transport(format!(
                "connection {} is closed",
                self.id
            )));
        }
        self.tx
            .send(Message::Text(text))
            .map_err(|_| wayfarer_core::Error::Transport("socket writer has stopped".to_string()))
    }

    async fn close(&self, code: u16, reason: &str) -> wayfarer_core::Result<()> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.tx
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.to_string().into(),
            })))
            .map_err(|_| wayfarer_core::Error::Transport("socket writer has stopped".to_string()))
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<ChatState>, principal: Principal) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let conn = Arc::new(WsConnection::new(tx));
    let session = state.manager.on_open(conn.clone(), principal);
    let session_id = session.id().to_string();
    let stop_writer = CancellationToken::new();

    let writer = {
        let stop = stop_writer.clone();
        let conn = conn.clone();
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    biased;
                    msg = rx.recv() => msg,
                    _ = stop.cancelled() => None,
                };
                let Some(msg) = msg else { break };
                let is_close = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!("WebSocket write failed: {}", e);
                    conn.mark_closed();
                    break;
                }
                if is_close {
                    break;
                }
            }
        })
    };

    read_loop(&state, &session, &conn, &mut stream).await;

    state.manager.on_close(&session_id);
    conn.mark_closed();
    stop_writer.cancel();
    if let Err(e) = writer.await {
        warn!(session_id = %session_id, "WebSocket writer task failed: {}", e);
    }
    info!(session_id = %session_id, "WebSocket chat connection ended");
}

async fn read_loop(
    state: &ChatState,
    session: &Arc<Session>,
    conn: &WsConnection,
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
) {
    while conn.is_open() {
        let next = match tokio::time::timeout(state.idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                info!(session_id = %session.id(), "Idle timeout, closing");
                if let Err(e) = conn.close(IDLE_CLOSE_CODE, "Idle timeout").await {
                    debug!("Idle close failed: {}", e);
                }
                break;
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                state.manager.on_message(session, &text).await;
            }
            Some(Ok(Message::Ping(data))) => {
                if conn.tx.send(Message::Pong(data)).is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(session_id = %session.id(), "WebSocket read error: {}", e);
                break;
            }
        }
    }
}
