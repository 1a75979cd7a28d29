// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind hosts, non-empty paths, and positive intervals.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.worker.concurrency < 1 {
        fail("worker.concurrency must be at least 1".to_string());
    }

    if config.queue.name.trim().is_empty() {
        fail("queue.name must not be empty".to_string());
    }

    if config.queue.max_attempts < 1 {
        fail(format!(
            "queue.max_attempts must be at least 1, got {}",
            config.queue.max_attempts
        ));
    }

    for (key, value) in [
        ("queue.poll_interval_ms", config.queue.poll_interval_ms),
        (
            "queue.visibility_timeout_secs",
            config.queue.visibility_timeout_secs,
        ),
        ("queue.retry_backoff_ms", config.queue.retry_backoff_ms),
        ("bus.poll_interval_ms", config.bus.poll_interval_ms),
        ("sla.interval_secs", config.sla.interval_secs),
        ("reconcile.interval_secs", config.reconcile.interval_secs),
        ("provider.timeout_secs", config.provider.timeout_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be greater than zero"));
        }
    }

    if config.queue.retry_backoff_ms > config.queue.retry_backoff_max_ms {
        fail(format!(
            "queue.retry_backoff_ms ({}) must not exceed queue.retry_backoff_max_ms ({})",
            config.queue.retry_backoff_ms, config.queue.retry_backoff_max_ms
        ));
    }

    if config.hub.connection_buffer < 1 {
        fail("hub.connection_buffer must be at least 1".to_string());
    }

    if config.hub.command_buffer < 1 {
        fail("hub.command_buffer must be at least 1".to_string());
    }

    if config.bus.capacity < 1 {
        fail("bus.capacity must be at least 1".to_string());
    }

    let base_url = config.provider.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "provider.base_url `{base_url}` must start with http:// or https://"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
