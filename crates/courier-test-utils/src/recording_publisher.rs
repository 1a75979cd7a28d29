// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory bus publisher used to assert on emitted events.

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_bus::{BusEvent, EventPublisher};
use courier_core::types::{CampaignStatus, SlaBreach, StatsSnapshot};
use courier_core::CourierError;

/// Records every published event in order.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<BusEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<BusEvent> {
        self.events.lock().await.clone()
    }

    /// Stats snapshots published for one campaign, oldest first.
    pub async fn stats_for(&self, campaign_id: &str) -> Vec<StatsSnapshot> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                BusEvent::CampaignStats(s) if s.campaign_id == campaign_id => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of snapshots announcing completion of one campaign.
    pub async fn completed_snapshots(&self, campaign_id: &str) -> usize {
        self.stats_for(campaign_id)
            .await
            .iter()
            .filter(|s| s.status == CampaignStatus::Completed)
            .count()
    }

    pub async fn breaches(&self) -> Vec<SlaBreach> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                BusEvent::SlaBreach(b) => Some(b.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &BusEvent) -> Result<(), CourierError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
