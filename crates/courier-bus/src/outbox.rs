// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process bus: events go through the `bus_events` outbox table.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{CourierError, StorageAdapter};

use crate::event::BusEvent;
use crate::publisher::EventPublisher;

/// Publisher used by standalone worker processes.
pub struct OutboxBus {
    storage: Arc<dyn StorageAdapter>,
}

impl OutboxBus {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EventPublisher for OutboxBus {
    async fn publish(&self, event: &BusEvent) -> Result<(), CourierError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| CourierError::Internal(format!("failed to encode bus event: {e}")))?;
        self.storage
            .append_bus_event(&event.channel(), &payload)
            .await?;
        Ok(())
    }
}
