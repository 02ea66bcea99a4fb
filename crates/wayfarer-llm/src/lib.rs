//! Wayfarer LLM - Streaming chat model abstraction
//!
//! This crate provides the model-facing side of the Wayfarer pipeline:
//! - Message: Conversation turns sent to the model
//! - Completion: Streaming request/event types and the final completion payload
//! - Provider: The `ChatModel` trait every backend implements
//! - Tools: Transport handles for downstream tool connections
//! - Mock: Scripted spy model for tests
//! - Ollama: Local Ollama streaming provider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod ollama;
pub mod provider;
pub mod tools;
pub mod util;

pub use completion::{
    ChatRequest, ChatStream, Completion, PendingConfirmation, StreamEvent, STREAM_BUFFER,
};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::{MockChatModel, ScriptedReply};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use provider::ChatModel;
pub use tools::{SharedToolTransport, ToolTransport};
