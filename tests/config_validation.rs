//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use session_protocol::config::{SessionConfig, VersionPolicy};
use session_protocol::ProtocolError;
use std::time::Duration;

#[test]
fn test_default_config_validates() {
    let config = SessionConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = SessionConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = SessionConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_backpressure_limit() {
    let mut config = SessionConfig::default();
    config.server.backpressure_limit = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Backpressure limit")));
}

#[test]
fn test_zero_max_connections() {
    let mut config = SessionConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Max connections")));
}

#[test]
fn test_max_connections_beyond_player_ids() {
    let mut config = SessionConfig::default();
    config.server.max_connections = 70_000;

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("16-bit")));
}

#[test]
fn test_long_shutdown_timeout() {
    let mut config = SessionConfig::default();
    config.server.shutdown_timeout = Duration::from_secs(120);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Shutdown timeout")));
}

#[test]
fn test_frame_size_bounds() {
    let mut config = SessionConfig::default();
    config.server.max_frame_size = 512;
    assert!(config.validate().iter().any(|e| e.contains("too small")));

    config.server.max_frame_size = 200 * 1024 * 1024;
    assert!(config.validate().iter().any(|e| e.contains("too large")));
}

#[test]
fn test_persistence_directory_must_exist() {
    let mut config = SessionConfig::default();
    config.persistence.path = Some("/definitely/not/here/players.bin".into());
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Persistence directory")));

    config.persistence.path = Some(String::new());
    assert!(config.validate().iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_empty_app_name() {
    let mut config = SessionConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name")));
}

#[test]
fn test_multiple_errors_reported_together() {
    let mut config = SessionConfig::default();
    config.server.address = String::new();
    config.server.backpressure_limit = 0;
    config.logging.app_name = String::new();

    assert_eq!(config.validate().len(), 3);
    match config.validate_strict() {
        Err(ProtocolError::ConfigError(msg)) => {
            assert!(msg.contains("Backpressure limit"));
            assert!(msg.contains("Application name"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.toml");

    let mut config = SessionConfig::default();
    config.server.address = "127.0.0.1:9000".into();
    config.server.shutdown_timeout = Duration::from_millis(2500);
    config.mods.version_policy = VersionPolicy::Compatible;
    config.save_to_file(&path).unwrap();

    let loaded = SessionConfig::from_file(&path).unwrap();
    assert_eq!(loaded.server.address, "127.0.0.1:9000");
    assert_eq!(loaded.server.shutdown_timeout, Duration::from_millis(2500));
    assert_eq!(loaded.mods.version_policy, VersionPolicy::Compatible);
}

#[test]
fn test_missing_file_is_config_error() {
    assert!(matches!(
        SessionConfig::from_file("/no/such/session.toml"),
        Err(ProtocolError::ConfigError(_))
    ));
}
