// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic campaign maintenance tasks.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    Campaign, CampaignStatus, CourierError, PeriodicTask, SendJob, StorageAdapter,
};
use tracing::{debug, warn};

use crate::completion::{CompletionCheck, CompletionDetector};
use crate::controller::CampaignController;
use crate::queue::JobQueue;

/// Repairs `processing` campaigns the per-job path left behind.
///
/// A pending recipient without an outstanding job (its job was acked as a
/// no-op while the campaign was paused, or `start` failed after the status
/// change) gets a fresh job. A campaign whose last completion check was lost
/// is completed.
pub struct CampaignReconciler {
    storage: Arc<dyn StorageAdapter>,
    queue: Arc<JobQueue>,
    completion: CompletionDetector,
}

impl CampaignReconciler {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        queue: Arc<JobQueue>,
        completion: CompletionDetector,
    ) -> Self {
        Self {
            storage,
            queue,
            completion,
        }
    }

    /// Enqueue a job for every pending recipient with no outstanding job.
    async fn requeue_stranded(&self, campaign: &Campaign) -> Result<usize, CourierError> {
        let stranded = self
            .storage
            .list_unqueued_pending_recipients(&campaign.id, self.queue.name())
            .await?;
        if stranded.is_empty() {
            return Ok(0);
        }
        let jobs: Vec<SendJob> = stranded
            .iter()
            .map(|r| SendJob::for_recipient(campaign, r))
            .collect();
        let enqueued = self.queue.enqueue_batch(&jobs).await?;
        warn!(campaign_id = %campaign.id, enqueued, "reconciler requeued stranded recipients");
        Ok(enqueued)
    }
}

#[async_trait]
impl PeriodicTask for CampaignReconciler {
    fn name(&self) -> &str {
        "campaign-reconciler"
    }

    async fn run_once(&self) -> Result<usize, CourierError> {
        let processing = self
            .storage
            .list_campaigns_by_status(CampaignStatus::Processing)
            .await?;
        let mut repaired = 0;
        for campaign in processing {
            if self.requeue_stranded(&campaign).await? > 0 {
                repaired += 1;
                continue;
            }
            if self.completion.try_complete(&campaign.id).await? == CompletionCheck::Completed {
                warn!(campaign_id = %campaign.id, "reconciler completed a stalled campaign");
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

/// Starts scheduled campaigns whose start time has passed.
pub struct ScheduledStarter {
    storage: Arc<dyn StorageAdapter>,
    controller: Arc<CampaignController>,
}

impl ScheduledStarter {
    pub fn new(storage: Arc<dyn StorageAdapter>, controller: Arc<CampaignController>) -> Self {
        Self { storage, controller }
    }
}

#[async_trait]
impl PeriodicTask for ScheduledStarter {
    fn name(&self) -> &str {
        "scheduled-starter"
    }

    async fn run_once(&self) -> Result<usize, CourierError> {
        let due = self.storage.list_due_scheduled_campaigns().await?;
        let mut started = 0;
        for campaign in due {
            match self.controller.start(&campaign.id).await {
                Ok(_) => started += 1,
                // Another process started or cancelled it first.
                Err(CourierError::InvalidTransition { from, .. }) => {
                    debug!(campaign_id = %campaign.id, status = %from, "scheduled campaign already moved");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::controller::{NewCampaign, NewRecipient};
    use crate::worker::SendWorker;
    use courier_core::{RecipientOutcome, TemplateParams};
    use courier_test_utils::TestHarness;

    fn queue(harness: &TestHarness) -> Arc<JobQueue> {
        Arc::new(JobQueue::new(harness.storage.clone(), harness.config.queue.clone()))
    }

    fn reconciler(harness: &TestHarness, queue: Arc<JobQueue>) -> CampaignReconciler {
        CampaignReconciler::new(
            harness.storage.clone(),
            queue,
            CompletionDetector::new(harness.storage.clone(), harness.publisher.clone()),
        )
    }

    fn campaign_input(name: &str, phones: &[&str]) -> NewCampaign {
        NewCampaign {
            organization_id: "org".into(),
            name: name.into(),
            account_name: "main".into(),
            template_name: "promo".into(),
            recipients: phones
                .iter()
                .map(|p| NewRecipient {
                    phone_number: p.to_string(),
                    recipient_name: None,
                    template_params: TemplateParams::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn reconciler_completes_stalled_campaign() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_organization("org").await.unwrap();
        let (campaign, recipients) = harness.draft_campaign("org", &["1"]).await.unwrap();
        harness
            .storage
            .transition_campaign(&campaign.id, &[CampaignStatus::Draft], CampaignStatus::Processing)
            .await
            .unwrap();
        // Outcome recorded but the completion check never ran.
        harness
            .storage
            .record_recipient_outcome(
                &campaign.id,
                &recipients[0].id,
                &RecipientOutcome::Sent { provider_message_id: "p".into() },
            )
            .await
            .unwrap();

        let reconciler = reconciler(&harness, queue(&harness));
        assert_eq!(reconciler.run_once().await.unwrap(), 1);
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
        assert_eq!(harness.publisher.completed_snapshots(&campaign.id).await, 1);
    }

    #[tokio::test]
    async fn starter_starts_only_due_campaigns() {
        let harness = TestHarness::new().await.unwrap();
        let queue = queue(&harness);
        let controller = Arc::new(CampaignController::new(
            harness.storage.clone(),
            harness.publisher.clone(),
            queue.clone(),
        ));
        let due = controller.create(campaign_input("due", &["1555"])).await.unwrap();
        let later = controller.create(campaign_input("later", &["1555"])).await.unwrap();
        controller
            .schedule(&due.id, chrono::Utc::now() - chrono::Duration::minutes(1))
            .await
            .unwrap();
        controller
            .schedule(&later.id, chrono::Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let starter = ScheduledStarter::new(harness.storage.clone(), controller.clone());
        assert_eq!(starter.run_once().await.unwrap(), 1);
        assert_eq!(controller.get(&due.id).await.unwrap().status, CampaignStatus::Processing);
        assert_eq!(controller.get(&later.id).await.unwrap().status, CampaignStatus::Scheduled);
        assert_eq!(queue.depth().await.unwrap(), 1);
        assert_eq!(starter.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reconciler_requeues_recipient_acked_while_paused() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_organization("org").await.unwrap();
        let queue = queue(&harness);
        let controller = CampaignController::new(
            harness.storage.clone(),
            harness.publisher.clone(),
            queue.clone(),
        );
        let campaign = controller
            .create(campaign_input("spring", &["1555", "1556"]))
            .await
            .unwrap();
        controller.start(&campaign.id).await.unwrap();
        controller.pause(&campaign.id).await.unwrap();

        // A worker claims a job and sees the campaign paused...
        let in_flight = harness
            .storage
            .claim(queue.name(), Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();
        // ...the campaign is resumed while that job is still outstanding...
        controller.start(&campaign.id).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 2);
        // ...and the worker acks it as a paused no-op.
        harness.storage.ack(in_flight.id).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 1);

        let reconciler = reconciler(&harness, queue.clone());
        assert_eq!(reconciler.run_once().await.unwrap(), 1);
        assert_eq!(queue.depth().await.unwrap(), 2);

        let worker = SendWorker::new(
            harness.storage.clone(),
            harness.mock_sender.clone(),
            harness.publisher.clone(),
        );
        while queue.process_next(&worker).await.unwrap() {}

        let done = controller.get(&campaign.id).await.unwrap();
        assert_eq!(done.status, CampaignStatus::Completed);
        assert_eq!(done.sent_count + done.failed_count, done.total_recipients);
        assert_eq!(done.sent_count, 2);
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reconciler_enqueues_processing_campaign_without_jobs() {
        let harness = TestHarness::new().await.unwrap();
        harness.seed_organization("org").await.unwrap();
        let queue = queue(&harness);
        // Status changed but the enqueue in `start` never happened.
        let (campaign, _) = harness.draft_campaign("org", &["1", "2", "3"]).await.unwrap();
        harness
            .storage
            .transition_campaign(&campaign.id, &[CampaignStatus::Draft], CampaignStatus::Processing)
            .await
            .unwrap();
        assert_eq!(queue.depth().await.unwrap(), 0);

        let reconciler = reconciler(&harness, queue.clone());
        assert_eq!(reconciler.run_once().await.unwrap(), 1);
        assert_eq!(queue.depth().await.unwrap(), 3);
        // Outstanding jobs are not duplicated.
        assert_eq!(reconciler.run_once().await.unwrap(), 0);
        assert_eq!(queue.depth().await.unwrap(), 3);
    }
}
