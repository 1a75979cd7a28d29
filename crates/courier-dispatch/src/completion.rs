// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign completion detection.
//!
//! Runs after every processed job. The move to `completed` is a guarded
//! update that only succeeds from `processing`, so concurrent workers that
//! all see zero pending recipients produce exactly one completion.

use std::sync::Arc;

use courier_bus::{publish_best_effort, BusEvent, EventPublisher};
use courier_core::{Campaign, CampaignStatus, CourierError, StorageAdapter};
use tracing::{debug, info};

/// Result of one completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCheck {
    /// This call performed the transition to completed.
    Completed,
    /// Recipients are still pending.
    InProgress { pending: i64 },
    /// Nothing pending, but the campaign was not in processing (already
    /// completed by another worker, paused, or cancelled).
    Settled,
}

pub struct CompletionDetector {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
}

impl CompletionDetector {
    pub fn new(storage: Arc<dyn StorageAdapter>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { storage, publisher }
    }

    /// Complete the campaign if nothing is pending, otherwise publish a
    /// progress snapshot.
    ///
    /// Progress is only published while the campaign is still processing, so
    /// the completed snapshot comes from the one call that won the transition.
    pub async fn check(&self, campaign_id: &str) -> Result<CompletionCheck, CourierError> {
        let result = self.try_complete(campaign_id).await?;
        if let CompletionCheck::InProgress { .. } = result
            && let Some(campaign) = self.storage.get_campaign(campaign_id).await?
            && campaign.status == CampaignStatus::Processing
        {
            self.publish(&campaign).await;
        }
        Ok(result)
    }

    /// Complete the campaign if nothing is pending. Publishes only the final
    /// snapshot.
    pub async fn try_complete(&self, campaign_id: &str) -> Result<CompletionCheck, CourierError> {
        let pending = self.storage.count_pending_recipients(campaign_id).await?;
        if pending > 0 {
            return Ok(CompletionCheck::InProgress { pending });
        }

        let won = self
            .storage
            .transition_campaign(campaign_id, &[CampaignStatus::Processing], CampaignStatus::Completed)
            .await?;
        if !won {
            debug!(campaign_id, "campaign already settled");
            return Ok(CompletionCheck::Settled);
        }

        let campaign = self
            .storage
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| CourierError::not_found("campaign", campaign_id))?;
        info!(
            campaign_id,
            organization_id = %campaign.organization_id,
            sent = campaign.sent_count,
            failed = campaign.failed_count,
            "campaign completed"
        );
        self.publish(&campaign).await;
        Ok(CompletionCheck::Completed)
    }

    async fn publish(&self, campaign: &Campaign) {
        let event = BusEvent::CampaignStats(campaign.snapshot());
        publish_best_effort(self.publisher.as_ref(), &event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::RecipientOutcome;
    use courier_test_utils::TestHarness;

    async fn processing_campaign(harness: &TestHarness, phones: &[&str]) -> (Campaign, Vec<String>) {
        harness.seed_organization("org").await.unwrap();
        let (campaign, recipients) = harness.draft_campaign("org", phones).await.unwrap();
        harness
            .storage
            .transition_campaign(&campaign.id, &[CampaignStatus::Draft], CampaignStatus::Processing)
            .await
            .unwrap();
        (campaign, recipients.into_iter().map(|r| r.id).collect())
    }

    fn detector(harness: &TestHarness) -> CompletionDetector {
        CompletionDetector::new(harness.storage.clone(), harness.publisher.clone())
    }

    #[tokio::test]
    async fn pending_recipients_publish_progress() {
        let harness = TestHarness::new().await.unwrap();
        let (campaign, recipients) = processing_campaign(&harness, &["1", "2"]).await;
        harness
            .storage
            .record_recipient_outcome(
                &campaign.id,
                &recipients[0],
                &RecipientOutcome::Sent { provider_message_id: "p-1".into() },
            )
            .await
            .unwrap();

        let result = detector(&harness).check(&campaign.id).await.unwrap();
        assert_eq!(result, CompletionCheck::InProgress { pending: 1 });

        let stats = harness.publisher.stats_for(&campaign.id).await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].status, CampaignStatus::Processing);
        assert_eq!(stats[0].sent_count, 1);
    }

    #[tokio::test]
    async fn concurrent_checks_complete_once() {
        let harness = TestHarness::new().await.unwrap();
        let (campaign, _) = processing_campaign(&harness, &[]).await;
        let detector = Arc::new(detector(&harness));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let detector = detector.clone();
            let id = campaign.id.clone();
            handles.push(tokio::spawn(async move { detector.check(&id).await.unwrap() }));
        }
        let mut completed = 0;
        for handle in handles {
            if handle.await.unwrap() == CompletionCheck::Completed {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
        assert_eq!(harness.publisher.completed_snapshots(&campaign.id).await, 1);

        let stored = harness.storage.get_campaign(&campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn paused_campaign_is_not_completed() {
        let harness = TestHarness::new().await.unwrap();
        let (campaign, _) = processing_campaign(&harness, &[]).await;
        harness
            .storage
            .transition_campaign(&campaign.id, &[CampaignStatus::Processing], CampaignStatus::Paused)
            .await
            .unwrap();

        let result = detector(&harness).check(&campaign.id).await.unwrap();
        assert_eq!(result, CompletionCheck::Settled);
        assert!(harness.publisher.events().await.is_empty());
    }
}
