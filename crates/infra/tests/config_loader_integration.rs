//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;

use conduit_domain::ConduitError;
use conduit_infra::config;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create config file");
    file.write_all(contents.as_bytes()).expect("Failed to write config file");
    path
}

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "conduit.json",
        r#"{
            "database": {
                "path": "/tmp/integration_test.db",
                "pool_size": 10,
                "encryption_key": "test-encryption-key-123"
            },
            "auth": {"callback_url_base": "https://conduit.example.com"},
            "definitions": {"path": "/etc/conduit/definitions.json"},
            "scheduler": {"retry_delay_seconds": 30, "job_timeout_seconds": 120},
            "fetch": {"max_token_refresh_tries": 5, "historical_fetch_days": 7}
        }"#,
    );

    let config = config::load_from_file(Some(path)).expect("JSON config loads");

    assert_eq!(config.database.path, "/tmp/integration_test.db");
    assert_eq!(config.database.pool_size, 10);
    assert_eq!(config.database.encryption_key, Some("test-encryption-key-123".to_string()));
    assert_eq!(config.auth.callback_url_base, "https://conduit.example.com");
    assert_eq!(config.definitions.path, "/etc/conduit/definitions.json");
    assert_eq!(config.scheduler.retry_delay_seconds, 30);
    assert_eq!(config.fetch.max_token_refresh_tries, 5);
    assert_eq!(config.fetch.historical_fetch_days, 7);
}

#[test]
fn test_load_config_from_toml_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(
        &dir,
        "conduit.toml",
        r#"
[database]
path = "/tmp/integration_test_toml.db"
pool_size = 8
encryption_key = "toml-key-456"

[user_directory]
base_url = "http://users.internal:8081"
timeout_seconds = 3

[http]
timeout_seconds = 15
user_agent = "conduit-test"
"#,
    );

    let config = config::load_from_file(Some(path)).expect("TOML config loads");

    assert_eq!(config.database.path, "/tmp/integration_test_toml.db");
    assert_eq!(config.database.pool_size, 8);
    assert_eq!(config.user_directory.base_url, "http://users.internal:8081");
    assert_eq!(config.user_directory.timeout_seconds, 3);
    assert_eq!(config.http.timeout_seconds, 15);
    assert_eq!(config.http.user_agent, "conduit-test");
}

#[test]
fn test_omitted_sections_take_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "config.json", r#"{"database": {"path": "minimal.db", "pool_size": 5}}"#);

    let config = config::load_from_file(Some(path)).expect("minimal config loads");

    assert_eq!(config.database.encryption_key, None);
    assert_eq!(config.scheduler.retry_delay_seconds, 10);
    assert_eq!(config.fetch.max_token_refresh_tries, 3);
    assert_eq!(config.fetch.historical_fetch_days, 15);
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = config::load_from_file(Some("/nonexistent/path/config.json".into()));

    assert!(matches!(result, Err(ConduitError::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_load_config_with_invalid_format() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "config.json", r#"{ "this is": "not valid" "#);

    let result = config::load_from_file(Some(path));

    assert!(matches!(result, Err(ConduitError::Config(msg)) if msg.contains("Invalid JSON")));
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_config(&dir, "config.yaml", "database: {}");

    let result = config::load_from_file(Some(path));

    assert!(matches!(result, Err(ConduitError::Config(msg)) if msg.contains("Unsupported")));
}
