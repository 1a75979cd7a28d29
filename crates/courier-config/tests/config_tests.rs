// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::{suggest_key, ConfigError};
use courier_config::model::{BusMode, CourierConfig};
use courier_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[logging]
level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[server]
host = "0.0.0.0"
port = 9090
bearer_token = "s3cret"
embedded_workers = 0

[worker]
concurrency = 8
restart_delay_ms = 50

[queue]
name = "sends"
visibility_timeout_secs = 60
max_attempts = 3

[bus]
mode = "local"

[hub]
connection_buffer = 16

[sla]
enabled = false
pickup_threshold_secs = 120

[reconcile]
interval_secs = 15

[provider]
base_url = "http://localhost:9999"
timeout_secs = 5
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.bearer_token.as_deref(), Some("s3cret"));
    assert_eq!(config.server.embedded_workers, 0);
    assert_eq!(config.worker.concurrency, 8);
    assert_eq!(config.queue.name, "sends");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.poll_interval_ms, 250, "unset keys keep defaults");
    assert_eq!(config.bus.mode, BusMode::Local);
    assert_eq!(config.hub.connection_buffer, 16);
    assert!(!config.sla.enabled);
    assert_eq!(config.sla.pickup_threshold_secs, 120);
    assert_eq!(config.reconcile.interval_secs, 15);
    assert_eq!(config.provider.timeout_secs, 5);
}

/// Missing sections fall back to compiled defaults.
#[test]
fn serialized_defaults_are_sensible() {
    let config = CourierConfig::default();

    assert_eq!(config.logging.level, "info");
    assert!(config.storage.database_path.ends_with("courier.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert!(config.server.bearer_token.is_none());
    assert_eq!(config.server.embedded_workers, 1);
    assert_eq!(config.worker.concurrency, 4);
    assert_eq!(config.queue.name, "campaign_sends");
    assert_eq!(config.queue.visibility_timeout_secs, 300);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.bus.mode, BusMode::Outbox);
    assert_eq!(config.hub.connection_buffer, 64);
    assert_eq!(config.sla.interval_secs, 30);
    assert_eq!(config.sla.resolution_threshold_secs, 1800);
    assert_eq!(config.reconcile.interval_secs, 60);
    assert_eq!(config.provider.base_url, "https://graph.facebook.com/v21.0");
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty config is valid");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.queue.max_attempts, 5);
}

/// Unknown field in [server] produces an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[server]
prot = 80
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "prot"
                && suggestion.as_deref() == Some("port")
                && valid_keys.contains("bearer_token")
        })
    });
    assert!(
        has_unknown_key,
        "should have UnknownKey error for 'prot' with suggestion 'port', got: {errors:?}"
    );
}

#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telemetry]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn unknown_bus_mode_is_rejected() {
    let toml = r#"
[bus]
mode = "carrier-pigeon"
"#;
    assert!(load_config_from_str(toml).is_err());
}

/// A misspelled enum value names the setting and suggests the closest variant.
#[test]
fn diagnostic_unknown_value_suggests_variant() {
    let toml = r#"
[bus]
mode = "outbx"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown mode");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::UnknownValue { key, suggestion, expected, .. } if {
            key == "bus.mode" && suggestion.as_deref() == Some("outbox") && expected.contains("local")
        })),
        "got: {errors:?}"
    );
}

/// An unknown top-level table lists the real sections.
#[test]
fn diagnostic_unknown_section_lists_sections() {
    let toml = r#"
[sever]
port = 80
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown table");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::UnknownKey { section: None, key, suggestion, valid_keys, .. } if {
            key == "sever" && suggestion.as_deref() == Some("server") && valid_keys.contains("reconcile")
        })),
        "got: {errors:?}"
    );
}

/// Invalid type (string where number expected) produces clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[worker]
concurrency = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("concurrency"))),
        "got: {errors:?}"
    );
}

#[test]
fn diagnostic_suggestions() {
    assert_eq!(
        suggest_key("max_attemps", &["name", "max_attempts", "poll_interval_ms"]),
        Some("max_attempts".to_string())
    );
    assert!(suggest_key("qqqq", &["name", "max_attempts"]).is_none());
}

/// ConfigError implements miette::Diagnostic (can be rendered).
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        section: Some("server".to_string()),
        key: "prot".to_string(),
        suggestion: Some("port".to_string()),
        valid_keys: "host, port, bearer_token, embedded_workers".to_string(),
        span: None,
        src: None,
    };

    let code = error.code().expect("should have diagnostic code").to_string();
    assert_eq!(code, "courier::config::unknown_key");
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `port`"), "got: {help}");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("prot"));
}

#[test]
fn validation_runs_after_deserialization() {
    let toml = r#"
[queue]
max_attempts = 0
retry_backoff_ms = 90000
"#;

    let errors = load_and_validate_str(toml).expect_err("invalid queue config");
    assert_eq!(errors.len(), 2, "got: {errors:?}");
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// COURIER_ env vars override file values, with underscores inside key names preserved.
#[test]
#[serial]
fn env_vars_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("courier.toml");
    std::fs::write(
        &path,
        "[server]\nport = 7000\nbearer_token = \"from-file\"\n\n[queue]\nmax_attempts = 2\n",
    )
    .unwrap();

    // SAFETY: test-only env mutation, serialized with #[serial].
    unsafe {
        std::env::set_var("COURIER_SERVER_BEARER_TOKEN", "from-env");
        std::env::set_var("COURIER_QUEUE_MAX_ATTEMPTS", "9");
    }
    let result = load_and_validate_path(&path);
    unsafe {
        std::env::remove_var("COURIER_SERVER_BEARER_TOKEN");
        std::env::remove_var("COURIER_QUEUE_MAX_ATTEMPTS");
    }

    let config = result.expect("config should load");
    assert_eq!(config.server.port, 7000);
    assert_eq!(config.server.bearer_token.as_deref(), Some("from-env"));
    assert_eq!(config.queue.max_attempts, 9);
}

#[test]
#[serial]
fn missing_config_file_is_silently_skipped() {
    let config = load_and_validate_path(std::path::Path::new("/nonexistent/courier.toml"))
        .expect("missing file should fall back to defaults");
    assert_eq!(config.server.port, 8080);
}
