// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publisher and sink seams of the bus.

use async_trait::async_trait;
use courier_core::CourierError;
use tracing::warn;

use crate::event::BusEvent;

/// Fire-and-forget publication of bus events.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &BusEvent) -> Result<(), CourierError>;
}

/// Receiver of events forwarded by the subscriber.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn deliver(&self, event: BusEvent);
}

/// Publish and swallow failures. Losing an event must never fail the caller's unit of work.
pub async fn publish_best_effort(publisher: &dyn EventPublisher, event: &BusEvent) {
    if let Err(e) = publisher.publish(event).await {
        warn!(
            event = event.name(),
            organization_id = %event.organization_id(),
            error = %e,
            "failed to publish bus event"
        );
    }
}
