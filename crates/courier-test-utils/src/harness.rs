// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles temp SQLite storage, a [`MockSender`], and a
//! [`RecordingPublisher`], with configuration tuned for fast queue polling.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::{CourierConfig, StorageConfig};
use courier_core::types::{
    now_timestamp, Account, Campaign, CampaignStatus, Recipient, Template, TemplateParams,
};
use courier_core::{CourierError, StorageAdapter};
use courier_storage::SqliteStorage;

use crate::mock_sender::{MockReply, MockSender};
use crate::recording_publisher::RecordingPublisher;

/// Account name seeded by [`TestHarness::seed_organization`].
pub const TEST_ACCOUNT: &str = "main";
/// Template name seeded by [`TestHarness::seed_organization`].
pub const TEST_TEMPLATE: &str = "promo";
/// Body of the seeded template.
pub const TEST_TEMPLATE_BODY: &str = "Hello {{1}}, your code is {{2}}";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<MockReply>,
    config: Option<CourierConfig>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            config: None,
        }
    }

    /// Script the mock sender's first replies.
    pub fn with_sender_replies(mut self, replies: Vec<MockReply>) -> Self {
        self.replies = replies;
        self
    }

    /// Start from a custom configuration. The storage section is always
    /// replaced by the temp database.
    pub fn with_config(mut self, config: CourierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CourierError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| CourierError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let storage = SqliteStorage::new(storage_config.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let mut config = self.config.unwrap_or_else(fast_config);
        config.storage = storage_config;

        Ok(TestHarness {
            mock_sender: Arc::new(MockSender::with_replies(self.replies)),
            publisher: Arc::new(RecordingPublisher::new()),
            storage,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// Defaults with short poll intervals and backoffs.
fn fast_config() -> CourierConfig {
    let mut config = CourierConfig::default();
    config.queue.poll_interval_ms = 10;
    config.queue.retry_backoff_ms = 10;
    config.queue.retry_backoff_max_ms = 50;
    config.worker.restart_delay_ms = 20;
    config.bus.poll_interval_ms = 20;
    config
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub mock_sender: Arc<MockSender>,
    pub publisher: Arc<RecordingPublisher>,
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub config: CourierConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Shorthand for `TestHarness::builder().build()`.
    pub async fn new() -> Result<Self, CourierError> {
        Self::builder().build().await
    }

    /// Register the standard sending account and template for `organization_id`.
    pub async fn seed_organization(&self, organization_id: &str) -> Result<(), CourierError> {
        let now = now_timestamp();
        self.storage
            .create_account(&Account {
                id: format!("acct-{organization_id}"),
                organization_id: organization_id.to_string(),
                name: TEST_ACCOUNT.to_string(),
                phone_number_id: "1000001".to_string(),
                access_token: Some("test-token".to_string()),
                created_at: now.clone(),
            })
            .await?;
        self.storage
            .create_template(&Template {
                id: format!("tmpl-{organization_id}"),
                organization_id: organization_id.to_string(),
                name: TEST_TEMPLATE.to_string(),
                language: "en_US".to_string(),
                body: TEST_TEMPLATE_BODY.to_string(),
                created_at: now,
            })
            .await
    }

    /// Persist a draft campaign using the seeded account and template, with
    /// one recipient per phone number (params `{"1": name, "2": index}`).
    pub async fn draft_campaign(
        &self,
        organization_id: &str,
        phones: &[&str],
    ) -> Result<(Campaign, Vec<Recipient>), CourierError> {
        let campaign = Campaign::draft(organization_id, "test campaign", TEST_ACCOUNT, TEST_TEMPLATE);
        let recipients: Vec<Recipient> = phones
            .iter()
            .enumerate()
            .map(|(i, phone)| {
                let name = format!("Recipient {i}");
                let mut params = TemplateParams::new();
                params.insert("1".into(), serde_json::Value::String(name.clone()));
                params.insert("2".into(), serde_json::Value::from(1000 + i as i64));
                Recipient::pending(&campaign.id, *phone, Some(name), params)
            })
            .collect();
        self.storage.create_campaign(&campaign, &recipients).await?;
        let stored = self
            .storage
            .get_campaign(&campaign.id)
            .await?
            .ok_or_else(|| CourierError::not_found("campaign", campaign.id.clone()))?;
        Ok((stored, recipients))
    }

    /// Poll until the campaign reaches `status` or `timeout` elapses.
    pub async fn wait_for_status(
        &self,
        campaign_id: &str,
        status: CampaignStatus,
        timeout: Duration,
    ) -> Result<Campaign, CourierError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let campaign = self
                .storage
                .get_campaign(campaign_id)
                .await?
                .ok_or_else(|| CourierError::not_found("campaign", campaign_id))?;
            if campaign.status == status {
                return Ok(campaign);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(CourierError::Timeout { duration: timeout });
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
