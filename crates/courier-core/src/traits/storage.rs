// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Account, AgentTransfer, BreachKind, Campaign, CampaignStatus, Contact, Message, QueueEntry,
    ReceiptStatus, Recipient, RecipientOutcome, Template,
};

/// Adapter for storage and persistence backends.
///
/// Every mutation of a shared row (campaign counters, recipient status,
/// transfer claims, queue claims) is a single conditional or incrementing
/// statement evaluated by the backend, so callers never need an
/// application-level lock.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), CourierError>;

    // --- Queue ---

    /// Append a payload to the named queue. Returns the entry id.
    async fn enqueue(
        &self,
        queue_name: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, CourierError>;

    /// Append many payloads in one transaction. Returns the number persisted.
    async fn enqueue_batch(
        &self,
        queue_name: &str,
        payloads: &[String],
        max_attempts: i32,
    ) -> Result<usize, CourierError>;

    /// Claim the next deliverable entry, hiding it for `visibility`.
    async fn claim(
        &self,
        queue_name: &str,
        visibility: Duration,
    ) -> Result<Option<QueueEntry>, CourierError>;

    /// Mark an entry as completed; it is never delivered again.
    async fn ack(&self, id: i64) -> Result<(), CourierError>;

    /// Schedule redelivery after `delay`. Returns `false` when the entry ran
    /// out of attempts and was marked failed instead.
    async fn retry(&self, id: i64, delay: Duration, error: &str) -> Result<bool, CourierError>;

    /// Mark an entry as permanently failed.
    async fn bury(&self, id: i64, error: &str) -> Result<(), CourierError>;

    /// Number of pending plus in-flight entries.
    async fn queue_depth(&self, queue_name: &str) -> Result<i64, CourierError>;

    // --- Accounts and templates ---

    async fn create_account(&self, account: &Account) -> Result<(), CourierError>;

    async fn find_account(
        &self,
        organization_id: &str,
        name: &str,
    ) -> Result<Option<Account>, CourierError>;

    async fn create_template(&self, template: &Template) -> Result<(), CourierError>;

    async fn find_template(
        &self,
        organization_id: &str,
        name: &str,
    ) -> Result<Option<Template>, CourierError>;

    // --- Contacts and messages ---

    /// Exact-match lookup of a contact phone number.
    async fn find_contact(
        &self,
        organization_id: &str,
        phone_number: &str,
    ) -> Result<Option<Contact>, CourierError>;

    /// Insert the contact unless one already exists for the same
    /// (organization, phone). Returns the stored row either way.
    async fn insert_contact_if_absent(&self, contact: &Contact) -> Result<Contact, CourierError>;

    async fn insert_message(&self, message: &Message) -> Result<(), CourierError>;

    async fn list_messages_for_contact(
        &self,
        contact_id: &str,
    ) -> Result<Vec<Message>, CourierError>;

    // --- Campaigns and recipients ---

    /// Persist a campaign and its recipients atomically.
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
    ) -> Result<(), CourierError>;

    async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>, CourierError>;

    async fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<Campaign>, CourierError>;

    /// Scheduled campaigns whose `scheduled_at` is at or before now.
    async fn list_due_scheduled_campaigns(&self) -> Result<Vec<Campaign>, CourierError>;

    /// Move a campaign to `to` only if its current status is one of `from`.
    ///
    /// Stamps `started_at` on the first move into processing and
    /// `completed_at` on the move into completed. Returns whether the row changed.
    async fn transition_campaign(
        &self,
        id: &str,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, CourierError>;

    /// Set `scheduled_at` and move a draft campaign to scheduled.
    async fn schedule_campaign(&self, id: &str, at: &str) -> Result<bool, CourierError>;

    async fn get_recipient(&self, id: &str) -> Result<Option<Recipient>, CourierError>;

    /// Pending recipients that have no pending or in-flight job in `queue_name`.
    async fn list_unqueued_pending_recipients(
        &self,
        campaign_id: &str,
        queue_name: &str,
    ) -> Result<Vec<Recipient>, CourierError>;

    async fn count_pending_recipients(&self, campaign_id: &str) -> Result<i64, CourierError>;

    /// Apply a terminal outcome to a still-pending recipient and bump the
    /// matching campaign counter in the same transaction.
    ///
    /// Returns `false` (and changes nothing) when the recipient was no longer pending.
    async fn record_recipient_outcome(
        &self,
        campaign_id: &str,
        recipient_id: &str,
        outcome: &RecipientOutcome,
    ) -> Result<bool, CourierError>;

    /// Apply a delivery receipt. Returns the affected campaign id when a
    /// counter moved.
    async fn apply_delivery_receipt(
        &self,
        provider_message_id: &str,
        status: ReceiptStatus,
    ) -> Result<Option<String>, CourierError>;

    // --- Agent transfers ---

    /// Insert a waiting transfer. Returns `false` when the contact already has
    /// an open (waiting or active) transfer.
    async fn create_transfer(&self, transfer: &AgentTransfer) -> Result<bool, CourierError>;

    async fn get_transfer(&self, id: &str) -> Result<Option<AgentTransfer>, CourierError>;

    /// Claim the oldest eligible waiting transfer for `agent_id`.
    async fn claim_next_transfer(
        &self,
        organization_id: &str,
        team_id: Option<&str>,
        agent_id: &str,
    ) -> Result<Option<AgentTransfer>, CourierError>;

    /// Force-assign a waiting or active transfer.
    async fn assign_transfer(
        &self,
        id: &str,
        agent_id: &str,
    ) -> Result<Option<AgentTransfer>, CourierError>;

    /// Move an active transfer back to automated handling.
    async fn resume_transfer(&self, id: &str) -> Result<Option<AgentTransfer>, CourierError>;

    /// Waiting transfers older than `threshold` without a recorded pickup breach.
    async fn list_pickup_breaches(
        &self,
        threshold: Duration,
    ) -> Result<Vec<AgentTransfer>, CourierError>;

    /// Active transfers assigned longer than `threshold` without a recorded
    /// resolution breach.
    async fn list_resolution_breaches(
        &self,
        threshold: Duration,
    ) -> Result<Vec<AgentTransfer>, CourierError>;

    /// Record a breach once. Returns `false` when it was already recorded or
    /// the transfer left the breaching state.
    async fn mark_breach(
        &self,
        id: &str,
        kind: BreachKind,
    ) -> Result<bool, CourierError>;

    // --- Bus outbox ---

    async fn append_bus_event(&self, channel: &str, payload: &str) -> Result<i64, CourierError>;

    /// Events with id greater than `after_id`, oldest first.
    async fn bus_events_after(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String)>, CourierError>;

    async fn latest_bus_event_id(&self) -> Result<i64, CourierError>;

    /// Delete events older than `retention`. Returns the number removed.
    async fn prune_bus_events(&self, retention: Duration) -> Result<usize, CourierError>;
}
