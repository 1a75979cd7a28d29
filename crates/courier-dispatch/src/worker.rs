// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-job send pipeline.
//!
//! Every step reads persisted state, so a redelivered job either finds the
//! recipient already settled (no send, no counter change) or repeats the
//! whole pipeline from scratch.

use std::sync::Arc;

use async_trait::async_trait;
use courier_bus::EventPublisher;
use courier_core::{
    CampaignStatus, CourierError, Message, MessageSender, RecipientOutcome, RecipientStatus,
    StorageAdapter,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::completion::CompletionDetector;
use crate::contact::{normalize_phone, resolve_contact};
use crate::queue::{Delivery, JobHandler, JobOutcome};
use crate::render::render;

/// Consumes send jobs: send, audit, record outcome, check completion.
pub struct SendWorker {
    storage: Arc<dyn StorageAdapter>,
    sender: Arc<dyn MessageSender>,
    completion: CompletionDetector,
}

impl SendWorker {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        sender: Arc<dyn MessageSender>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let completion = CompletionDetector::new(storage.clone(), publisher);
        Self {
            storage,
            sender,
            completion,
        }
    }

    /// Record a terminal failure that happened before any send.
    async fn fail_recipient(&self, delivery: &Delivery, reason: String) -> Result<JobOutcome, CourierError> {
        let job = &delivery.job;
        warn!(
            campaign_id = %job.campaign_id,
            recipient_id = %job.recipient_id,
            reason = %reason,
            "recipient failed before send"
        );
        self.storage
            .record_recipient_outcome(
                &job.campaign_id,
                &job.recipient_id,
                &RecipientOutcome::Failed { error: reason },
            )
            .await?;
        self.completion.check(&job.campaign_id).await?;
        Ok(JobOutcome::Ack)
    }
}

#[async_trait]
impl JobHandler for SendWorker {
    async fn handle(&self, delivery: &Delivery) -> Result<JobOutcome, CourierError> {
        let job = &delivery.job;

        let Some(campaign) = self.storage.get_campaign(&job.campaign_id).await? else {
            warn!(campaign_id = %job.campaign_id, "job for unknown campaign; dropping");
            return Ok(JobOutcome::Ack);
        };
        if campaign.status != CampaignStatus::Processing {
            debug!(
                campaign_id = %campaign.id,
                status = %campaign.status,
                "campaign not processing; skipping job"
            );
            return Ok(JobOutcome::Ack);
        }

        let Some(recipient) = self.storage.get_recipient(&job.recipient_id).await? else {
            warn!(recipient_id = %job.recipient_id, "job for unknown recipient; dropping");
            return Ok(JobOutcome::Ack);
        };
        if recipient.status != RecipientStatus::Pending {
            debug!(
                campaign_id = %campaign.id,
                recipient_id = %recipient.id,
                status = %recipient.status,
                "recipient already settled; redelivery is a no-op"
            );
            self.completion.check(&campaign.id).await?;
            return Ok(JobOutcome::Ack);
        }

        let Some(account) = self
            .storage
            .find_account(&campaign.organization_id, &campaign.account_name)
            .await?
        else {
            return self
                .fail_recipient(delivery, format!("account '{}' not found", campaign.account_name))
                .await;
        };
        let Some(template) = self
            .storage
            .find_template(&campaign.organization_id, &campaign.template_name)
            .await?
        else {
            return self
                .fail_recipient(delivery, format!("template '{}' not found", campaign.template_name))
                .await;
        };

        let contact = match resolve_contact(
            self.storage.as_ref(),
            &campaign.organization_id,
            &job.phone_number,
            job.recipient_name.as_deref(),
        )
        .await
        {
            Ok(contact) => contact,
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => return self.fail_recipient(delivery, format!("contact resolution failed: {e}")).await,
        };

        let body = render(&template.body, &job.template_params);
        let phone = normalize_phone(&job.phone_number);

        let sent = self
            .sender
            .send(&account, phone, &template, &job.template_params)
            .await;

        let outcome = match sent {
            Ok(provider_message_id) => RecipientOutcome::Sent { provider_message_id },
            Err(CourierError::RateLimited { retry_after }) if !delivery.is_final_attempt() => {
                debug!(
                    campaign_id = %campaign.id,
                    recipient_id = %recipient.id,
                    attempt = delivery.attempt,
                    "provider throttled send; retrying"
                );
                return Ok(JobOutcome::Retry {
                    reason: "provider rate limited".into(),
                    after: retry_after,
                });
            }
            Err(e) => {
                warn!(
                    campaign_id = %campaign.id,
                    recipient_id = %recipient.id,
                    error = %e,
                    "send failed"
                );
                RecipientOutcome::Failed { error: e.to_string() }
            }
        };

        let metadata = json!({
            "campaign_id": campaign.id,
            "recipient_id": recipient.id,
        })
        .to_string();
        let result = match &outcome {
            RecipientOutcome::Sent { provider_message_id } => Ok(provider_message_id.as_str()),
            RecipientOutcome::Failed { error } => Err(error.as_str()),
        };
        let message = Message::outgoing(
            &campaign.organization_id,
            &contact.id,
            body,
            result,
            Some(metadata),
        );
        self.storage.insert_message(&message).await?;

        let applied = self
            .storage
            .record_recipient_outcome(&campaign.id, &recipient.id, &outcome)
            .await?;
        if applied {
            if let RecipientOutcome::Sent { provider_message_id } = &outcome {
                info!(
                    campaign_id = %campaign.id,
                    recipient_id = %recipient.id,
                    provider_message_id = %provider_message_id,
                    "message sent"
                );
            }
        } else {
            debug!(
                campaign_id = %campaign.id,
                recipient_id = %recipient.id,
                "recipient settled concurrently; counters unchanged"
            );
        }

        self.completion.check(&campaign.id).await?;
        Ok(JobOutcome::Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Campaign, MessageStatus, SendJob};
    use courier_test_utils::harness::TEST_TEMPLATE_BODY;
    use courier_test_utils::{MockReply, TestHarness};
    use std::time::Duration;

    struct Fixture {
        harness: TestHarness,
        worker: SendWorker,
        campaign: Campaign,
        jobs: Vec<SendJob>,
    }

    async fn fixture(phones: &[&str]) -> Fixture {
        fixture_with(TestHarness::new().await.unwrap(), phones, true).await
    }

    async fn fixture_with(harness: TestHarness, phones: &[&str], seed: bool) -> Fixture {
        if seed {
            harness.seed_organization("org").await.unwrap();
        }
        let (campaign, recipients) = harness.draft_campaign("org", phones).await.unwrap();
        harness
            .storage
            .transition_campaign(&campaign.id, &[CampaignStatus::Draft], CampaignStatus::Processing)
            .await
            .unwrap();
        let jobs = recipients
            .iter()
            .map(|r| SendJob::for_recipient(&campaign, r))
            .collect();
        let worker = SendWorker::new(
            harness.storage.clone(),
            harness.mock_sender.clone(),
            harness.publisher.clone(),
        );
        Fixture { harness, worker, campaign, jobs }
    }

    fn delivery(job: &SendJob, attempt: i32) -> Delivery {
        Delivery {
            entry_id: 1,
            job: job.clone(),
            attempt,
            max_attempts: 3,
        }
    }

    async fn campaign(f: &Fixture) -> Campaign {
        f.harness.storage.get_campaign(&f.campaign.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn successful_send_records_everything() {
        let f = fixture(&["+15550001"]).await;
        let outcome = f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Ack);

        let sent = f.harness.mock_sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "15550001");

        let recipient = f.harness.storage.get_recipient(&f.jobs[0].recipient_id).await.unwrap().unwrap();
        assert_eq!(recipient.status, RecipientStatus::Sent);
        assert!(recipient.provider_message_id.is_some());

        let contact = f.harness.storage.find_contact("org", "15550001").await.unwrap().unwrap();
        let messages = f.harness.storage.list_messages_for_contact(&contact.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Sent);
        assert_eq!(messages[0].content, "Hello Recipient 0, your code is 1000");
        assert_ne!(messages[0].content, TEST_TEMPLATE_BODY);
        assert!(messages[0].metadata.as_deref().unwrap().contains(&f.campaign.id));

        let stored = campaign(&f).await;
        assert_eq!(stored.sent_count, 1);
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert_eq!(f.harness.publisher.completed_snapshots(&f.campaign.id).await, 1);
    }

    #[tokio::test]
    async fn redelivery_does_not_double_count() {
        let f = fixture(&["15550001", "15550002"]).await;
        f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        f.worker.handle(&delivery(&f.jobs[0], 2)).await.unwrap();

        assert_eq!(f.harness.mock_sender.send_count().await, 1);
        let stored = campaign(&f).await;
        assert_eq!(stored.sent_count, 1);
        assert_eq!(stored.failed_count, 0);
        assert_eq!(stored.status, CampaignStatus::Processing);
    }

    #[tokio::test]
    async fn provider_failure_is_terminal_and_audited() {
        let f = fixture(&["15550001"]).await;
        f.harness.mock_sender.fail_recipient("15550001", "number blocked").await;

        let outcome = f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Ack);

        let recipient = f.harness.storage.get_recipient(&f.jobs[0].recipient_id).await.unwrap().unwrap();
        assert_eq!(recipient.status, RecipientStatus::Failed);
        assert!(recipient.error_message.unwrap().contains("number blocked"));

        let contact = f.harness.storage.find_contact("org", "15550001").await.unwrap().unwrap();
        let messages = f.harness.storage.list_messages_for_contact(&contact.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].status, MessageStatus::Failed);

        let stored = campaign(&f).await;
        assert_eq!(stored.failed_count, 1);
        assert_eq!(stored.status, CampaignStatus::Completed);
    }

    #[tokio::test]
    async fn missing_account_fails_without_sending() {
        let harness = TestHarness::new().await.unwrap();
        let f = fixture_with(harness, &["15550001"], false).await;

        let outcome = f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Ack);
        assert_eq!(f.harness.mock_sender.send_count().await, 0);

        let recipient = f.harness.storage.get_recipient(&f.jobs[0].recipient_id).await.unwrap().unwrap();
        assert_eq!(recipient.status, RecipientStatus::Failed);
        assert!(recipient.error_message.unwrap().contains("account 'main' not found"));
        assert_eq!(campaign(&f).await.failed_count, 1);
    }

    #[tokio::test]
    async fn paused_campaign_jobs_are_noops() {
        let f = fixture(&["15550001"]).await;
        f.harness
            .storage
            .transition_campaign(&f.campaign.id, &[CampaignStatus::Processing], CampaignStatus::Paused)
            .await
            .unwrap();

        let outcome = f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        assert_eq!(outcome, JobOutcome::Ack);
        assert_eq!(f.harness.mock_sender.send_count().await, 0);

        let stored = campaign(&f).await;
        assert_eq!(stored.sent_count + stored.failed_count, 0);
        let recipient = f.harness.storage.get_recipient(&f.jobs[0].recipient_id).await.unwrap().unwrap();
        assert_eq!(recipient.status, RecipientStatus::Pending);
    }

    #[tokio::test]
    async fn rate_limit_retries_until_final_attempt() {
        let harness = TestHarness::builder()
            .with_sender_replies(vec![
                MockReply::RateLimited(Some(Duration::from_secs(2))),
                MockReply::RateLimited(None),
            ])
            .build()
            .await
            .unwrap();
        let f = fixture_with(harness, &["15550001"], true).await;

        let first = f.worker.handle(&delivery(&f.jobs[0], 1)).await.unwrap();
        assert_eq!(
            first,
            JobOutcome::Retry {
                reason: "provider rate limited".into(),
                after: Some(Duration::from_secs(2)),
            }
        );
        let stored = campaign(&f).await;
        assert_eq!(stored.sent_count + stored.failed_count, 0);

        let last = f.worker.handle(&delivery(&f.jobs[0], 3)).await.unwrap();
        assert_eq!(last, JobOutcome::Ack);
        assert_eq!(campaign(&f).await.failed_count, 1);
    }
}
