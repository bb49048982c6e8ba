//! Integration tests for configuration validation

#![allow(clippy::expect_used)]

use relay_protocol::config::{LoggingConfig, RelayConfig, ServerConfig, DEFAULT_PORT};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = RelayConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert!(config.validate_strict().is_ok());
}

#[test]
fn test_default_port() {
    let config = RelayConfig::default();
    assert!(config.server.address.ends_with(&format!(":{DEFAULT_PORT}")));
    assert!(config.client.address.ends_with(&format!(":{DEFAULT_PORT}")));
}

#[test]
fn test_invalid_server_address() {
    let mut config = RelayConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = RelayConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_limits_rejected() {
    let config = RelayConfig::default_with_overrides(|c| {
        c.server.max_connections = 0;
        c.server.backpressure_limit = 0;
        c.server.max_payload_size = 0;
    });

    let errors = config.validate();
    assert_eq!(errors.len(), 3, "unexpected errors: {errors:?}");
}

#[test]
fn test_payload_limit_above_ceiling() {
    let mut config = RelayConfig::default();
    config.server.max_payload_size = 64 * 1024 * 1024;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max payload size too large")));
}

#[test]
fn test_write_timeout_bounds() {
    let mut config = RelayConfig::default();
    config.server.write_timeout = Duration::from_millis(5);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Write timeout too short")));

    config.server.write_timeout = Duration::from_secs(600);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Write timeout too long")));
}

#[test]
fn test_client_timeouts() {
    let mut config = RelayConfig::default();
    config.client.response_timeout = Duration::from_millis(1);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Response timeout too short")));
}

#[test]
fn test_validate_strict_joins_errors() {
    let mut config = RelayConfig::default();
    config.server.address = String::new();
    config.logging = LoggingConfig {
        app_name: String::new(),
        ..LoggingConfig::default()
    };

    let err = config.validate_strict().expect_err("should fail");
    let text = err.to_string();
    assert!(text.contains("Server address cannot be empty"));
    assert!(text.contains("Application name cannot be empty"));
}

#[test]
fn test_with_port_keeps_host() {
    let server = ServerConfig::default().with_port(0);
    assert_eq!(server.address, "0.0.0.0:0");
}

#[test]
fn test_toml_roundtrip() {
    let toml = r#"
        [server]
        address = "127.0.0.1:7000"
        max_connections = 12
        backpressure_limit = 8
        max_payload_size = 4096
        write_timeout = 2500

        [logging]
        app_name = "relay-test"
        log_level = "debug"
        json_format = true
    "#;

    let config = RelayConfig::from_toml(toml).expect("valid toml");
    assert_eq!(config.server.address, "127.0.0.1:7000");
    assert_eq!(config.server.max_connections, 12);
    assert_eq!(config.server.write_timeout, Duration::from_millis(2500));
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.logging.json_format);
    // Missing sections fall back to defaults
    assert_eq!(
        config.client.address,
        RelayConfig::default().client.address
    );
}

#[test]
fn test_invalid_log_level_rejected() {
    let toml = r#"
        [logging]
        app_name = "relay"
        log_level = "loud"
        json_format = false
    "#;
    assert!(RelayConfig::from_toml(toml).is_err());
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("relay.toml");

    let config = RelayConfig::default_with_overrides(|c| {
        c.server.address = "127.0.0.1:9999".to_string();
        c.logging.log_level = Level::WARN;
    });
    config.save_to_file(&path).expect("save");

    let loaded = RelayConfig::from_file(&path).expect("load");
    assert_eq!(loaded.server.address, "127.0.0.1:9999");
    assert_eq!(loaded.logging.log_level, Level::WARN);
}

#[test]
fn test_example_config_parses() {
    let example = RelayConfig::example_config();
    let parsed = RelayConfig::from_toml(&example).expect("example config parses");
    assert!(parsed.validate().is_empty());
}

#[test]
fn test_partial_sections_fill_defaults() {
    let toml = r#"
        [server]
        address = "127.0.0.1:7001"

        [logging]
        log_level = "warn"
    "#;

    let config = RelayConfig::from_toml(toml).expect("partial sections parse");
    let defaults = ServerConfig::default();
    assert_eq!(config.server.address, "127.0.0.1:7001");
    assert_eq!(config.server.max_connections, defaults.max_connections);
    assert_eq!(config.server.backpressure_limit, defaults.backpressure_limit);
    assert_eq!(config.server.write_timeout, defaults.write_timeout);
    assert_eq!(config.logging.log_level, Level::WARN);
    assert_eq!(config.logging.app_name, LoggingConfig::default().app_name);
    assert!(config.validate().is_empty());
}
