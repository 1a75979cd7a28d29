// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::types::{
    Account, AgentTransfer, BreachKind, Campaign, CampaignStatus, Contact, Message, QueueEntry,
    ReceiptStatus, Recipient, RecipientOutcome, Template,
};
use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, CourierError> {
        self.db.get().ok_or_else(|| CourierError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CourierError> {
        let db = Database::open_with_options(&self.config.database_path, self.config.wal_mode)
            .await?;
        self.db.set(db).map_err(|_| CourierError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.db()?.close().await
    }

    // --- Queue ---

    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, CourierError> {
        queries::queue::enqueue(self.db()?, queue_name, payload, max_attempts).await
    }

    async fn enqueue_batch(
        &self,
        queue_name: &str,
        payloads: &[String],
        max_attempts: i32,
    ) -> Result<usize, CourierError> {
        queries::queue::enqueue_batch(self.db()?, queue_name, payloads, max_attempts).await
    }

    async fn claim(
        &self,
        queue_name: &str,
        visibility: Duration,
    ) -> Result<Option<QueueEntry>, CourierError> {
        queries::queue::claim(self.db()?, queue_name, visibility).await
    }

    async fn ack(&self, id: i64) -> Result<(), CourierError> {
        queries::queue::ack(self.db()?, id).await
    }

    async fn retry(&self, id: i64, delay: Duration, error: &str) -> Result<bool, CourierError> {
        queries::queue::retry(self.db()?, id, delay, error).await
    }

    async fn bury(&self, id: i64, error: &str) -> Result<(), CourierError> {
        queries::queue::bury(self.db()?, id, error).await
    }

    async fn queue_depth(&self, queue_name: &str) -> Result<i64, CourierError> {
        queries::queue::depth(self.db()?, queue_name).await
    }

    // --- Accounts and templates ---

    async fn create_account(&self, account: &Account) -> Result<(), CourierError> {
        queries::accounts::create_account(self.db()?, account).await
    }

    async fn find_account(
        &self,
        organization_id: &str,
        name: &str,
    ) -> Result<Option<Account>, CourierError> {
        queries::accounts::find_account(self.db()?, organization_id, name).await
    }

    async fn create_template(&self, template: &Template) -> Result<(), CourierError> {
        queries::accounts::create_template(self.db()?, template).await
    }

    async fn find_template(
        &self,
        organization_id: &str,
        name: &str,
    ) -> Result<Option<Template>, CourierError> {
        queries::accounts::find_template(self.db()?, organization_id, name).await
    }

    // --- Contacts and messages ---

    async fn find_contact(
        &self,
        organization_id: &str,
        phone_number: &str,
    ) -> Result<Option<Contact>, CourierError> {
        queries::contacts::find_contact(self.db()?, organization_id, phone_number).await
    }

    async fn insert_contact_if_absent(&self, contact: &Contact) -> Result<Contact, CourierError> {
        queries::contacts::insert_if_absent(self.db()?, contact).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), CourierError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn list_messages_for_contact(
        &self,
        contact_id: &str,
    ) -> Result<Vec<Message>, CourierError> {
        queries::messages::list_for_contact(self.db()?, contact_id).await
    }

    // --- Campaigns and recipients ---

    async fn create_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), CourierError> {
        queries::campaigns::create_campaign(self.db()?, campaign, recipients).await
    }

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, CourierError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, CourierError> {
        queries::campaigns::list_by_status(self.db()?, status).await
    }

    async fn list_due_scheduled_campaigns(&self) -> Result<Vec<Campaign>, CourierError> {
        queries::campaigns::list_due_scheduled(self.db()?).await
    }

    async fn transition_campaign(
        &self,
        id: &str,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, CourierError> {
        queries::campaigns::transition(self.db()?, id, from, to).await
    }

    async fn schedule_campaign(&self, id: &str, at: &str) -> Result<bool, CourierError> {
        queries::campaigns::schedule(self.db()?, id, at).await
    }

    async fn get_recipient(&self, id: &str) -> Result<Option<Recipient>, CourierError> {
        queries::recipients::get_recipient(self.db()?, id).await
    }

    async fn list_unqueued_pending_recipients(
        &self,
        campaign_id: &str,
        queue_name: &str,
    ) -> Result<Vec<Recipient>, CourierError> {
        queries::recipients::list_unqueued_pending(self.db()?, campaign_id, queue_name).await
    }

    async fn count_pending_recipients(&self, campaign_id: &str) -> Result<i64, CourierError> {
        queries::recipients::count_pending(self.db()?, campaign_id).await
    }

    async fn record_recipient_outcome(
        &self,
        campaign_id: &str,
        recipient_id: &str,
        outcome: &RecipientOutcome,
    ) -> Result<bool, CourierError> {
        queries::recipients::record_outcome(self.db()?, campaign_id, recipient_id, outcome).await
    }

    async fn apply_delivery_receipt(
        &self,
        provider_message_id: &str,
        status: ReceiptStatus,
    ) -> Result<Option<String>, CourierError> {
        queries::recipients::apply_receipt(self.db()?, provider_message_id, status).await
    }

    // --- Agent transfers ---

    async fn create_transfer(&self, transfer: &AgentTransfer) -> Result<bool, CourierError> {
        queries::transfers::create(self.db()?, transfer).await
    }

    async fn get_transfer(&self, id: &str) -> Result<Option<AgentTransfer>, CourierError> {
        queries::transfers::get(self.db()?, id).await
    }

    async fn claim_next_transfer(
        &self,
        organization_id: &str,
        team_id: Option<&str>,
        agent_id: &str,
    ) -> Result<Option<AgentTransfer>, CourierError> {
        queries::transfers::claim_next(self.db()?, organization_id, team_id, agent_id).await
    }

    async fn assign_transfer(
        &self,
        id: &str,
        agent_id: &str,
    ) -> Result<Option<AgentTransfer>, CourierError> {
        queries::transfers::assign(self.db()?, id, agent_id).await
    }

    async fn resume_transfer(&self, id: &str) -> Result<Option<AgentTransfer>, CourierError> {
        queries::transfers::resume(self.db()?, id).await
    }

    async fn list_pickup_breaches(
        &self,
        threshold: Duration,
    ) -> Result<Vec<AgentTransfer>, CourierError> {
        queries::transfers::list_breaches(self.db()?, BreachKind::Pickup, threshold).await
    }

    async fn list_resolution_breaches(
        &self,
        threshold: Duration,
    ) -> Result<Vec<AgentTransfer>, CourierError> {
        queries::transfers::list_breaches(self.db()?, BreachKind::Resolution, threshold).await
    }

    async fn mark_breach(&self, id: &str, kind: BreachKind) -> Result<bool, CourierError> {
        queries::transfers::mark_breach(self.db()?, id, kind).await
    }

    // --- Bus outbox ---

    async fn append_bus_event(&self, channel: &str, payload: &str) -> Result<i64, CourierError> {
        queries::bus_events::append(self.db()?, channel, payload).await
    }

    async fn bus_events_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String)>, CourierError> {
        queries::bus_events::after(self.db()?, after_id, limit).await
    }

    async fn latest_bus_event_id(&self) -> Result<i64, CourierError> {
        queries::bus_events::latest_id(self.db()?).await
    }

    async fn prune_bus_events(&self, retention: Duration) -> Result<usize, CourierError> {
        queries::bus_events::prune(self.db()?, retention).await
    }
}
