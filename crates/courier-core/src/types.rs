// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, dispatch, bus, and gateway crates.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Positional template parameters keyed by stringified index ("1", "2", ...).
pub type TemplateParams = BTreeMap<String, serde_json::Value>;

/// Timestamp layout used for every persisted instant.
///
/// Fixed width with millisecond precision, so stored values compare
/// lexicographically in SQL.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Render an instant in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp back into an instant.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Sender,
    Bus,
}

// --- Campaigns ---

/// Lifecycle state of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Processing,
    Paused,
    Cancelled,
    Completed,
}

impl CampaignStatus {
    /// Whether the campaign can never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Allowed lifecycle edges. Only processing and paused may cycle.
    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Processing)
                | (Draft, Cancelled)
                | (Scheduled, Processing)
                | (Scheduled, Cancelled)
                | (Processing, Paused)
                | (Processing, Cancelled)
                | (Processing, Completed)
                | (Paused, Processing)
                | (Paused, Cancelled)
        )
    }
}

/// A bulk-send operation targeting many recipients with one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Name of the sending account within the organization.
    pub account_name: String,
    /// Name of the message template within the organization.
    pub template_name: String,
    pub status: CampaignStatus,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub read_count: i64,
    pub failed_count: i64,
    pub scheduled_at: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Campaign {
    /// Build a new draft campaign with zeroed counters.
    pub fn draft(
        organization_id: impl Into<String>,
        name: impl Into<String>,
        account_name: impl Into<String>,
        template_name: impl Into<String>,
    ) -> Self {
        let now = now_timestamp();
        Self {
            id: uuid_v4(),
            organization_id: organization_id.into(),
            name: name.into(),
            account_name: account_name.into(),
            template_name: template_name.into(),
            status: CampaignStatus::Draft,
            total_recipients: 0,
            sent_count: 0,
            delivered_count: 0,
            read_count: 0,
            failed_count: 0,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Recipients that reached a terminal send outcome.
    pub fn processed_count(&self) -> i64 {
        self.sent_count + self.failed_count
    }

    /// Point-in-time progress summary for dashboards.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            campaign_id: self.id.clone(),
            organization_id: self.organization_id.clone(),
            status: self.status,
            sent_count: self.sent_count,
            delivered_count: self.delivered_count,
            read_count: self.read_count,
            failed_count: self.failed_count,
        }
    }
}

/// Per-recipient send state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

/// One addressee within a campaign and its delivery outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub campaign_id: String,
    pub phone_number: String,
    pub recipient_name: Option<String>,
    pub template_params: TemplateParams,
    pub status: RecipientStatus,
    pub provider_message_id: Option<String>,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub delivered_at: Option<String>,
    pub read_at: Option<String>,
}

impl Recipient {
    /// Build a pending recipient for the given campaign.
    pub fn pending(
        campaign_id: impl Into<String>,
        phone_number: impl Into<String>,
        recipient_name: Option<String>,
        template_params: TemplateParams,
    ) -> Self {
        Self {
            id: uuid_v4(),
            campaign_id: campaign_id.into(),
            phone_number: phone_number.into(),
            recipient_name,
            template_params,
            status: RecipientStatus::Pending,
            provider_message_id: None,
            sent_at: None,
            error_message: None,
            delivered_at: None,
            read_at: None,
        }
    }
}

/// Terminal result of one send attempt, applied to a pending recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    Sent { provider_message_id: String },
    Failed { error: String },
}

/// Delivery receipt reported by the provider after a successful send.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

// --- Queue ---

/// The queue payload: "send to this recipient".
///
/// Unknown fields are ignored on decode so older workers tolerate newer producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendJob {
    pub campaign_id: String,
    pub recipient_id: String,
    pub organization_id: String,
    pub phone_number: String,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub template_params: TemplateParams,
    pub enqueued_at: String,
}

impl SendJob {
    /// Build the job for one pending recipient of a campaign.
    pub fn for_recipient(campaign: &Campaign, recipient: &Recipient) -> Self {
        Self {
            campaign_id: campaign.id.clone(),
            recipient_id: recipient.id.clone(),
            organization_id: campaign.organization_id.clone(),
            phone_number: recipient.phone_number.clone(),
            recipient_name: recipient.recipient_name.clone(),
            template_params: recipient.template_params.clone(),
            enqueued_at: now_timestamp(),
        }
    }
}

/// A persisted queue row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    pub payload: String,
    pub status: String,
    /// Number of times the entry has been claimed.
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: String,
    pub updated_at: String,
    pub available_at: String,
    pub locked_until: Option<String>,
    pub last_error: Option<String>,
}

// --- Accounts, templates, contacts, messages ---

/// A sending account registered with the messaging provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Provider-side identifier of the sending phone number.
    pub phone_number_id: String,
    pub access_token: Option<String>,
    pub created_at: String,
}

/// An approved message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub language: String,
    /// Body with positional placeholders `{{1}}` .. `{{10}}`.
    pub body: String,
    pub created_at: String,
}

/// A person reachable by phone within an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub organization_id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub created_at: String,
}

impl Contact {
    pub fn new(
        organization_id: impl Into<String>,
        phone_number: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self {
            id: uuid_v4(),
            organization_id: organization_id.into(),
            phone_number: phone_number.into(),
            name,
            created_at: now_timestamp(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Failed,
}

/// Audit record written once per send attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub organization_id: String,
    pub contact_id: String,
    pub direction: MessageDirection,
    pub content: String,
    pub status: MessageStatus,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    /// JSON metadata (campaign linkage for outgoing campaign messages).
    pub metadata: Option<String>,
    pub created_at: String,
}

impl Message {
    /// Build an outgoing audit record for one send attempt.
    pub fn outgoing(
        organization_id: impl Into<String>,
        contact_id: impl Into<String>,
        content: impl Into<String>,
        result: Result<&str, &str>,
        metadata: Option<String>,
    ) -> Self {
        let (status, provider_message_id, error_message) = match result {
            Ok(id) => (MessageStatus::Sent, Some(id.to_string()), None),
            Err(e) => (MessageStatus::Failed, None, Some(e.to_string())),
        };
        Self {
            id: uuid_v4(),
            organization_id: organization_id.into(),
            contact_id: contact_id.into(),
            direction: MessageDirection::Outgoing,
            content: content.into(),
            status,
            provider_message_id,
            error_message,
            metadata,
            created_at: now_timestamp(),
        }
    }
}

// --- Agent transfers ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Waiting,
    Active,
    Resumed,
}

/// A conversation handed from automated handling to a human agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTransfer {
    pub id: String,
    pub organization_id: String,
    pub contact_id: String,
    pub team_id: Option<String>,
    pub status: TransferStatus,
    pub assigned_agent_id: Option<String>,
    pub created_at: String,
    pub assigned_at: Option<String>,
    pub resumed_at: Option<String>,
}

impl AgentTransfer {
    /// Build a new waiting transfer.
    pub fn waiting(
        organization_id: impl Into<String>,
        contact_id: impl Into<String>,
        team_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid_v4(),
            organization_id: organization_id.into(),
            contact_id: contact_id.into(),
            team_id,
            status: TransferStatus::Waiting,
            assigned_agent_id: None,
            created_at: now_timestamp(),
            assigned_at: None,
            resumed_at: None,
        }
    }
}

// --- Events ---

/// Progress snapshot published after every completion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub campaign_id: String,
    pub organization_id: String,
    pub status: CampaignStatus,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub read_count: i64,
    pub failed_count: i64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
    /// Transfer waited too long for an agent to pick it up.
    Pickup,
    /// Transfer stayed with an agent too long without being resumed.
    Resolution,
}

/// A transfer that crossed its SLA threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBreach {
    pub transfer_id: String,
    pub organization_id: String,
    pub contact_id: String,
    pub team_id: Option<String>,
    pub assigned_agent_id: Option<String>,
    pub kind: BreachKind,
    pub waited_secs: i64,
    pub detected_at: String,
}

fn uuid_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}
