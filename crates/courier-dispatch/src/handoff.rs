// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claim-based hand-off of conversations to human agents.

use std::sync::Arc;

use courier_bus::{publish_best_effort, BusEvent, EventPublisher};
use courier_core::{AgentTransfer, CourierError, StorageAdapter, TransferStatus};
use tracing::info;

/// Agent transfer queue.
///
/// `pick_next` is a single conditional claim in storage, so two agents
/// racing for the same transfer can never both receive it.
pub struct TransferQueue {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
}

impl TransferQueue {
    pub fn new(storage: Arc<dyn StorageAdapter>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { storage, publisher }
    }

    /// Open a waiting transfer. A contact can have one open transfer at a time.
    pub async fn create(
        &self,
        organization_id: &str,
        contact_id: &str,
        team_id: Option<&str>,
    ) -> Result<AgentTransfer, CourierError> {
        if organization_id.is_empty() || contact_id.is_empty() {
            return Err(CourierError::Validation(
                "organization_id and contact_id are required".into(),
            ));
        }
        let transfer = AgentTransfer::waiting(organization_id, contact_id, team_id.map(str::to_string));
        if !self.storage.create_transfer(&transfer).await? {
            return Err(CourierError::Conflict(format!(
                "contact {contact_id} already has an open transfer"
            )));
        }
        info!(transfer_id = %transfer.id, organization_id, contact_id, team_id, "transfer created");
        self.publish(&transfer).await;
        Ok(transfer)
    }

    pub async fn get(&self, id: &str) -> Result<AgentTransfer, CourierError> {
        self.storage
            .get_transfer(id)
            .await?
            .ok_or_else(|| CourierError::not_found("transfer", id))
    }

    /// Claim the oldest waiting transfer for `agent_id`, within `team_id` when given.
    pub async fn pick_next(
        &self,
        organization_id: &str,
        agent_id: &str,
        team_id: Option<&str>,
    ) -> Result<Option<AgentTransfer>, CourierError> {
        let claimed = self
            .storage
            .claim_next_transfer(organization_id, team_id, agent_id)
            .await?;
        if let Some(transfer) = &claimed {
            info!(transfer_id = %transfer.id, agent_id, "transfer picked");
            self.publish(transfer).await;
        }
        Ok(claimed)
    }

    /// Force-assign a waiting or active transfer.
    pub async fn assign(&self, id: &str, agent_id: &str) -> Result<AgentTransfer, CourierError> {
        match self.storage.assign_transfer(id, agent_id).await? {
            Some(transfer) => {
                info!(transfer_id = id, agent_id, "transfer assigned");
                self.publish(&transfer).await;
                Ok(transfer)
            }
            None => Err(self.rejected(id, TransferStatus::Active).await),
        }
    }

    /// Hand an active transfer back to automated handling.
    pub async fn resume(&self, id: &str) -> Result<AgentTransfer, CourierError> {
        match self.storage.resume_transfer(id).await? {
            Some(transfer) => {
                info!(transfer_id = id, "transfer resumed");
                self.publish(&transfer).await;
                Ok(transfer)
            }
            None => Err(self.rejected(id, TransferStatus::Resumed).await),
        }
    }

    async fn rejected(&self, id: &str, to: TransferStatus) -> CourierError {
        match self.get(id).await {
            Ok(current) => CourierError::InvalidTransition {
                entity: "transfer",
                from: current.status.to_string(),
                to: to.to_string(),
            },
            Err(e) => e,
        }
    }

    async fn publish(&self, transfer: &AgentTransfer) {
        let event = BusEvent::TransferUpdated(transfer.clone());
        publish_best_effort(self.publisher.as_ref(), &event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::TestHarness;

    fn queue(harness: &TestHarness) -> Arc<TransferQueue> {
        Arc::new(TransferQueue::new(harness.storage.clone(), harness.publisher.clone()))
    }

    #[tokio::test]
    async fn second_open_transfer_conflicts() {
        let harness = TestHarness::new().await.unwrap();
        let q = queue(&harness);
        q.create("org", "contact-1", None).await.unwrap();
        let err = q.create("org", "contact-1", Some("sales")).await.unwrap_err();
        assert!(matches!(err, CourierError::Conflict(_)));
    }

    #[tokio::test]
    async fn racing_agents_get_distinct_transfers() {
        let harness = TestHarness::new().await.unwrap();
        let q = queue(&harness);
        let only = q.create("org", "contact-1", None).await.unwrap();

        let a = {
            let q = q.clone();
            tokio::spawn(async move { q.pick_next("org", "agent-a", None).await.unwrap() })
        };
        let b = {
            let q = q.clone();
            tokio::spawn(async move { q.pick_next("org", "agent-b", None).await.unwrap() })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners: Vec<_> = results.iter().flatten().collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].id, only.id);
        assert_eq!(winners[0].status, TransferStatus::Active);
    }

    #[tokio::test]
    async fn team_scoping_and_oldest_first() {
        let harness = TestHarness::new().await.unwrap();
        let q = queue(&harness);
        let first = q.create("org", "c1", Some("sales")).await.unwrap();
        let support = q.create("org", "c2", Some("support")).await.unwrap();
        let second = q.create("org", "c3", Some("sales")).await.unwrap();

        let picked = q.pick_next("org", "agent", Some("support")).await.unwrap().unwrap();
        assert_eq!(picked.id, support.id);
        let picked = q.pick_next("org", "agent", None).await.unwrap().unwrap();
        assert_eq!(picked.id, first.id);
        let picked = q.pick_next("org", "agent", Some("sales")).await.unwrap().unwrap();
        assert_eq!(picked.id, second.id);
        assert!(q.pick_next("org", "agent", None).await.unwrap().is_none());
        assert!(q.pick_next("other-org", "agent", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assign_and_resume_follow_lifecycle() {
        let harness = TestHarness::new().await.unwrap();
        let q = queue(&harness);
        let t = q.create("org", "c1", None).await.unwrap();

        assert!(matches!(
            q.resume(&t.id).await,
            Err(CourierError::InvalidTransition { .. })
        ));
        let assigned = q.assign(&t.id, "supervisor-pick").await.unwrap();
        assert_eq!(assigned.assigned_agent_id.as_deref(), Some("supervisor-pick"));
        assert!(assigned.assigned_at.is_some());

        let resumed = q.resume(&t.id).await.unwrap();
        assert_eq!(resumed.status, TransferStatus::Resumed);
        assert!(matches!(
            q.assign(&t.id, "late").await,
            Err(CourierError::InvalidTransition { .. })
        ));
        assert!(matches!(q.resume("missing").await, Err(CourierError::NotFound { .. })));

        // The contact can be handed off again once the earlier transfer closed.
        q.create("org", "c1", None).await.unwrap();
        assert_eq!(harness.publisher.events().await.len(), 4);
    }
}
