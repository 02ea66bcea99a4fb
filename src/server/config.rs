//! Server configuration types
//!
//! The `session`, `security`, `memory`, `pipeline` and `credentials`
//! sections deserialize straight into the core crate's config types.

use serde::{Deserialize, Serialize};
use wayfarer_core::{
    CredentialsConfig, MemoryConfig, PipelineConfig, SecurityConfig, SessionConfig,
};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP / WebSocket listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted inbound WebSocket frame
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Close a socket that sends nothing for this long
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_frame_bytes: default_max_frame_bytes(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_idle_timeout() -> u64 {
    600
}

/// Chat model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            system_prompt: None,
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

/// Trusted identity headers set by the fronting auth proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_principal_header")]
    pub principal_header: String,
    #[serde(default = "default_subject_header")]
    pub subject_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            principal_header: default_principal_header(),
            subject_header: default_subject_header(),
        }
    }
}

fn default_principal_header() -> String {
    "x-auth-user".to_string()
}

fn default_subject_header() -> String {
    "x-auth-subject".to_string()
}

#[cfg(test)]
mod tests;
