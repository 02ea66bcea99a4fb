use super::*;
use crate::server::loader::DEFAULT_CONFIG;
use crate::server::validation::validate_config;
use config::{Config, File, FileFormat};

fn parse(extra: &str) -> AppConfig {
    Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::from_str(extra, FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap()
}

#[test]
fn test_embedded_defaults() {
    let config = parse("");

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.max_frame_bytes, 65536);
    assert_eq!(config.session.heartbeat_interval_secs, 30);
    assert_eq!(config.session.thinking_interval_secs, 5);
    assert_eq!(config.security.max_input_chars, 4000);
    assert_eq!(config.memory.backend, "sqlite");
    assert_eq!(config.memory.history_limit, 50);
    assert_eq!(config.pipeline.model_timeout_secs, 300);
    assert!(!config.credentials.enabled);
    assert_eq!(config.auth.principal_header, "x-auth-user");
    assert!(config.llm.system_prompt.is_some());
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_file_overrides_and_tools() {
    let config = parse(
        r#"
        [session]
        thinking_interval_secs = 2

        [credentials]
        enabled = true
        token_url = "https://auth.example.com/token"
        client_id = "wayfarer"
        tools = [{ key = "flights", endpoint = "https://flights.example.com" }]
        "#,
    );

    assert_eq!(config.session.thinking_interval_secs, 2);
    assert_eq!(config.session.heartbeat_interval_secs, 30);
    assert_eq!(config.credentials.tools.len(), 1);
    assert_eq!(config.credentials.tools[0].key, "flights");
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_rejects_zero_intervals() {
    let config = parse("[session]\nheartbeat_interval_secs = 0");
    assert!(validate_config(&config).is_err());

    let config = parse("[session]\nthinking_interval_secs = 0");
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_rejects_zero_idle_timeout() {
    let config = parse("[server]\nidle_timeout_secs = 0");
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("idle_timeout_secs"));

    // Shorter than the model timeout only warns
    let config = parse("[server]\nidle_timeout_secs = 60");
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_rejects_credentials_without_token_url() {
    let config = parse("[credentials]\nenabled = true");
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("token_url"));
}

#[test]
fn test_minimal_config_uses_defaults() {
    let config: AppConfig = Config::builder()
        .add_source(File::from_str("[server]\nhost = \"0.0.0.0\"\nport = 9000", FileFormat::Toml))
        .build()
        .unwrap()
        .try_deserialize()
        .unwrap();

    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.idle_timeout_secs, 600);
    assert_eq!(config.auth.subject_header, "x-auth-subject");
    assert_eq!(config.session.worker_pool_size, 0);
}
