// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SLA sweep over agent transfers.
//!
//! Two thresholds apply: a transfer waiting too long for pickup, and a
//! transfer held by an agent too long without being resumed. Each breach is
//! flagged in storage by a guarded update, so repeated or overlapping scans
//! notify at most once per transfer and kind.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use courier_bus::{publish_best_effort, BusEvent, EventPublisher};
use courier_config::model::SlaConfig;
use courier_core::types::{now_timestamp, parse_timestamp};
use courier_core::{
    AgentTransfer, BreachKind, CourierError, PeriodicTask, SlaBreach, StorageAdapter,
};
use tracing::warn;

pub struct SlaSweeper {
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    pickup_threshold: Duration,
    resolution_threshold: Duration,
}

impl SlaSweeper {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        publisher: Arc<dyn EventPublisher>,
        config: &SlaConfig,
    ) -> Self {
        Self {
            storage,
            publisher,
            pickup_threshold: config.pickup_threshold(),
            resolution_threshold: config.resolution_threshold(),
        }
    }

    async fn sweep(&self, kind: BreachKind) -> Result<usize, CourierError> {
        let candidates = match kind {
            BreachKind::Pickup => self.storage.list_pickup_breaches(self.pickup_threshold).await?,
            BreachKind::Resolution => {
                self.storage
                    .list_resolution_breaches(self.resolution_threshold)
                    .await?
            }
        };

        let mut flagged = 0;
        for transfer in candidates {
            if !self.storage.mark_breach(&transfer.id, kind).await? {
                continue;
            }
            let breach = breach_for(&transfer, kind);
            warn!(
                transfer_id = %breach.transfer_id,
                organization_id = %breach.organization_id,
                kind = %kind,
                waited_secs = breach.waited_secs,
                "transfer breached SLA"
            );
            publish_best_effort(self.publisher.as_ref(), &BusEvent::SlaBreach(breach)).await;
            flagged += 1;
        }
        Ok(flagged)
    }
}

fn breach_for(transfer: &AgentTransfer, kind: BreachKind) -> SlaBreach {
    let since = match kind {
        BreachKind::Pickup => Some(transfer.created_at.as_str()),
        BreachKind::Resolution => transfer.assigned_at.as_deref(),
    };
    let waited_secs = since
        .and_then(parse_timestamp)
        .map(|start| (Utc::now() - start).num_seconds().max(0))
        .unwrap_or(0);
    SlaBreach {
        transfer_id: transfer.id.clone(),
        organization_id: transfer.organization_id.clone(),
        contact_id: transfer.contact_id.clone(),
        team_id: transfer.team_id.clone(),
        assigned_agent_id: transfer.assigned_agent_id.clone(),
        kind,
        waited_secs,
        detected_at: now_timestamp(),
    }
}

#[async_trait]
impl PeriodicTask for SlaSweeper {
    fn name(&self) -> &str {
        "sla-sweeper"
    }

    async fn run_once(&self) -> Result<usize, CourierError> {
        let pickup = self.sweep(BreachKind::Pickup).await?;
        let resolution = self.sweep(BreachKind::Resolution).await?;
        Ok(pickup + resolution)
    }
}
