// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign lifecycle: create, schedule, start, pause, cancel, receipts.
//!
//! Every state change is a conditional update in storage. The in-memory
//! [`CampaignStatus::can_transition_to`] check only produces a precise error
//! early; the storage guard is what decides races.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_bus::{publish_best_effort, BusEvent, EventPublisher};
use courier_core::types::format_timestamp;
use courier_core::{
    Campaign, CampaignStatus, CourierError, ReceiptStatus, Recipient, SendJob, StorageAdapter,
    TemplateParams,
};
use serde::Deserialize;
use tracing::info;

use crate::completion::CompletionDetector;
use crate::contact::normalize_phone;
use crate::queue::JobQueue;

/// Input for [`CampaignController::create`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCampaign {
    pub organization_id: String,
    pub name: String,
    pub account_name: String,
    pub template_name: String,
    #[serde(default)]
    pub recipients: Vec<NewRecipient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipient {
    pub phone_number: String,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub template_params: TemplateParams,
}

pub struct CampaignController {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    queue: Arc<JobQueue>,
    completion: CompletionDetector,
}

impl CampaignController {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        publisher: Arc<dyn EventPublisher>,
        queue: Arc<JobQueue>,
    ) -> Self {
        let completion = CompletionDetector::new(storage.clone(), publisher.clone());
        Self {
            storage,
            publisher,
            queue,
            completion,
        }
    }

    /// Persist a draft campaign with all of its recipients.
    pub async fn create(&self, input: NewCampaign) -> Result<Campaign, CourierError> {
        for (field, value) in [
            ("organization_id", &input.organization_id),
            ("name", &input.name),
            ("account_name", &input.account_name),
            ("template_name", &input.template_name),
        ] {
            if value.trim().is_empty() {
                return Err(CourierError::Validation(format!("{field} must not be empty")));
            }
        }
        if let Some(bad) = input
            .recipients
            .iter()
            .find(|r| normalize_phone(&r.phone_number).is_empty())
        {
            return Err(CourierError::Validation(format!(
                "invalid recipient phone number: {:?}",
                bad.phone_number
            )));
        }

        let campaign = Campaign::draft(
            input.organization_id,
            input.name,
            input.account_name,
            input.template_name,
        );
        let recipients: Vec<Recipient> = input
            .recipients
            .into_iter()
            .map(|r| Recipient::pending(&campaign.id, r.phone_number, r.recipient_name, r.template_params))
            .collect();

        self.storage.create_campaign(&campaign, &recipients).await?;
        info!(
            campaign_id = %campaign.id,
            organization_id = %campaign.organization_id,
            recipients = recipients.len(),
            "campaign created"
        );
        self.get(&campaign.id).await
    }

    pub async fn get(&self, id: &str) -> Result<Campaign, CourierError> {
        self.storage
            .get_campaign(id)
            .await?
            .ok_or_else(|| CourierError::not_found("campaign", id))
    }

    /// Set the start time of a draft campaign.
    pub async fn schedule(&self, id: &str, at: DateTime<Utc>) -> Result<Campaign, CourierError> {
        let current = self.get(id).await?;
        if !self.storage.schedule_campaign(id, &format_timestamp(at)).await? {
            return Err(invalid(&current, CampaignStatus::Scheduled));
        }
        let campaign = self.get(id).await?;
        info!(campaign_id = id, scheduled_at = ?campaign.scheduled_at, "campaign scheduled");
        self.publish(&campaign).await;
        Ok(campaign)
    }

    /// Move to processing and enqueue a job per pending recipient without an
    /// outstanding job. Also resumes a paused campaign.
    pub async fn start(&self, id: &str) -> Result<Campaign, CourierError> {
        let campaign = self
            .move_to(
                id,
                &[CampaignStatus::Draft, CampaignStatus::Scheduled, CampaignStatus::Paused],
                CampaignStatus::Processing,
            )
            .await?;

        let pending = self
            .storage
            .list_unqueued_pending_recipients(id, self.queue.name())
            .await?;
        let jobs: Vec<SendJob> = pending
            .iter()
            .map(|r| SendJob::for_recipient(&campaign, r))
            .collect();
        let enqueued = self.queue.enqueue_batch(&jobs).await?;
        info!(campaign_id = id, enqueued, "campaign started");

        // Zero recipients (or nothing left after a resume) completes right away.
        self.completion.check(id).await?;
        self.get(id).await
    }

    pub async fn pause(&self, id: &str) -> Result<Campaign, CourierError> {
        let campaign = self
            .move_to(id, &[CampaignStatus::Processing], CampaignStatus::Paused)
            .await?;
        info!(campaign_id = id, "campaign paused");
        self.publish(&campaign).await;
        Ok(campaign)
    }

    pub async fn cancel(&self, id: &str) -> Result<Campaign, CourierError> {
        let campaign = self
            .move_to(
                id,
                &[
                    CampaignStatus::Draft,
                    CampaignStatus::Scheduled,
                    CampaignStatus::Processing,
                    CampaignStatus::Paused,
                ],
                CampaignStatus::Cancelled,
            )
            .await?;
        info!(campaign_id = id, "campaign cancelled");
        self.publish(&campaign).await;
        Ok(campaign)
    }

    /// Apply a provider delivery receipt. Returns the updated campaign when a
    /// counter moved, `None` for unknown or duplicate receipts.
    pub async fn apply_receipt(
        &self,
        provider_message_id: &str,
        status: ReceiptStatus,
    ) -> Result<Option<Campaign>, CourierError> {
        let Some(campaign_id) = self
            .storage
            .apply_delivery_receipt(provider_message_id, status)
            .await?
        else {
            return Ok(None);
        };
        let campaign = self.get(&campaign_id).await?;
        self.publish(&campaign).await;
        Ok(Some(campaign))
    }

    async fn move_to(
        &self,
        id: &str,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<Campaign, CourierError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(invalid(&current, to));
        }
        if !self.storage.transition_campaign(id, from, to).await? {
            // Lost a race: report the state that won.
            let latest = self.get(id).await?;
            return Err(invalid(&latest, to));
        }
        self.get(id).await
    }

    async fn publish(&self, campaign: &Campaign) {
        let event = BusEvent::CampaignStats(campaign.snapshot());
        publish_best_effort(self.publisher.as_ref(), &event).await;
    }
}

fn invalid(campaign: &Campaign, to: CampaignStatus) -> CourierError {
    CourierError::InvalidTransition {
        entity: "campaign",
        from: campaign.status.to_string(),
        to: to.to_string(),
    }
}
