// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process bus backed by a tokio broadcast channel.

use async_trait::async_trait;
use courier_core::CourierError;
use tokio::sync::broadcast;

use crate::event::BusEvent;
use crate::publisher::EventPublisher;

/// Broadcast bus for a single process (serve mode with embedded workers).
pub struct LocalBus {
    tx: broadcast::Sender<BusEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventPublisher for LocalBus {
    async fn publish(&self, event: &BusEvent) -> Result<(), CourierError> {
        // No subscribers is not an error: nobody is watching.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
