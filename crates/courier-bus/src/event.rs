// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events carried on the bus and pushed to dashboards.

use courier_core::types::{AgentTransfer, SlaBreach, StatsSnapshot};
use serde::{Deserialize, Serialize};

/// An organization-scoped event.
///
/// Serializes as `{"event": "<name>", "payload": {...}}`, the exact frame sent
/// to live dashboard connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BusEvent {
    CampaignStats(StatsSnapshot),
    SlaBreach(SlaBreach),
    TransferUpdated(AgentTransfer),
}

impl BusEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CampaignStats(_) => "campaign_stats",
            Self::SlaBreach(_) => "sla_breach",
            Self::TransferUpdated(_) => "transfer_updated",
        }
    }

    pub fn organization_id(&self) -> &str {
        match self {
            Self::CampaignStats(s) => &s.organization_id,
            Self::SlaBreach(b) => &b.organization_id,
            Self::TransferUpdated(t) => &t.organization_id,
        }
    }

    /// Channel name, scoped per organization: `<event>:<organization_id>`.
    pub fn channel(&self) -> String {
        format!("{}:{}", self.name(), self.organization_id())
    }
}
