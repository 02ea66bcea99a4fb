//! WebSocket module for Wayfarer
//!
//! - /ws/chat - Conversational session socket

pub mod chat;

pub use chat::{chat_handler, ChatState};

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new().route("/ws/chat", get(chat_handler))
}
