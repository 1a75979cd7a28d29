// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier dispatch service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Log filter settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP/WebSocket server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Send worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Durable job queue settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Stats pub/sub settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Live connection hub settings.
    #[serde(default)]
    pub hub: HubConfig,

    /// Transfer SLA sweeper settings.
    #[serde(default)]
    pub sla: SlaConfig,

    /// Campaign reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Messaging provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP/WebSocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on every authenticated route.
    /// The server refuses to start while this is unset.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Number of worker pools embedded in the serving process (0 disables).
    #[serde(default = "default_embedded_workers")]
    pub embedded_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            embedded_workers: default_embedded_workers(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_embedded_workers() -> usize {
    1
}

/// Send worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Concurrent consumer loops per worker pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay before a failed consumer loop is restarted.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_restart_delay_ms() -> u64 {
    1000
}

/// Durable job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Queue name used for campaign send jobs.
    #[serde(default = "default_queue_name")]
    pub name: String,

    /// Idle wait between empty claims.
    #[serde(default = "default_queue_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a claimed job stays hidden before it is redelivered.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Deliveries before a job is marked dead.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Base delay for exponential retry backoff.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for the retry backoff.
    #[serde(default = "default_retry_backoff_max_ms")]
    pub retry_backoff_max_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            poll_interval_ms: default_queue_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: default_retry_backoff_max_ms(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }
}

fn default_queue_name() -> String {
    "campaign_sends".to_string()
}

fn default_queue_poll_interval_ms() -> u64 {
    250
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_max_attempts() -> i32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_retry_backoff_max_ms() -> u64 {
    60_000
}

/// Transport used to carry events from workers to the serving process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusMode {
    /// Events are appended to the `bus_events` table and polled by the server.
    #[default]
    Outbox,
    /// In-process broadcast channel; only reaches embedded workers.
    Local,
}

/// Stats pub/sub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    #[serde(default)]
    pub mode: BusMode,

    /// Outbox poll interval.
    #[serde(default = "default_bus_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Outbox rows older than this are pruned.
    #[serde(default = "default_bus_retention_secs")]
    pub retention_secs: u64,

    /// Local broadcast channel capacity.
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: BusMode::default(),
            poll_interval_ms: default_bus_poll_interval_ms(),
            retention_secs: default_bus_retention_secs(),
            capacity: default_bus_capacity(),
        }
    }
}

impl BusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

fn default_bus_poll_interval_ms() -> u64 {
    500
}

fn default_bus_retention_secs() -> u64 {
    3600
}

fn default_bus_capacity() -> usize {
    1024
}

/// Live connection hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Outbound frames buffered per connection before it is dropped.
    #[serde(default = "default_connection_buffer")]
    pub connection_buffer: usize,

    /// Pending hub commands before senders wait.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            connection_buffer: default_connection_buffer(),
            command_buffer: default_command_buffer(),
        }
    }
}

fn default_connection_buffer() -> usize {
    64
}

fn default_command_buffer() -> usize {
    1024
}

/// Transfer SLA sweeper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlaConfig {
    #[serde(default = "default_sla_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_sla_interval_secs")]
    pub interval_secs: u64,

    /// Maximum time a transfer may wait for an agent.
    #[serde(default = "default_pickup_threshold_secs")]
    pub pickup_threshold_secs: u64,

    /// Maximum time a transfer may stay with an agent.
    #[serde(default = "default_resolution_threshold_secs")]
    pub resolution_threshold_secs: u64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            enabled: default_sla_enabled(),
            interval_secs: default_sla_interval_secs(),
            pickup_threshold_secs: default_pickup_threshold_secs(),
            resolution_threshold_secs: default_resolution_threshold_secs(),
        }
    }
}

impl SlaConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn pickup_threshold(&self) -> Duration {
        Duration::from_secs(self.pickup_threshold_secs)
    }

    pub fn resolution_threshold(&self) -> Duration {
        Duration::from_secs(self.resolution_threshold_secs)
    }
}

fn default_sla_enabled() -> bool {
    true
}

fn default_sla_interval_secs() -> u64 {
    30
}

fn default_pickup_threshold_secs() -> u64 {
    300
}

fn default_resolution_threshold_secs() -> u64 {
    1800
}

/// Campaign reconciliation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation and scheduled-start passes.
    #[serde(default = "default_reconcile_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval_secs(),
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_reconcile_interval_secs() -> u64 {
    60
}

/// Messaging provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the provider's Graph-style API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider_base_url() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}
