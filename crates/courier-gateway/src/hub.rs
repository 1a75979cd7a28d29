// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live connection hub.
//!
//! One task owns the connection set. Callers talk to it through a command
//! channel, so register, unregister and broadcast are applied one at a time
//! and nothing else ever touches the map.
//!
//! Each connection has a bounded outbound buffer. A broadcast never waits on
//! a connection: if its buffer is full or its receiver is gone, that one
//! connection is dropped and delivery to the others continues.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use courier_bus::{BusEvent, EventSink};
use courier_config::model::HubConfig;
use courier_core::CourierError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Hub-assigned connection identifier.
pub type ConnectionId = u64;

enum HubCommand {
    Register {
        id: ConnectionId,
        organization_id: String,
        user_id: String,
        frames: mpsc::Sender<String>,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        organization_id: String,
        payload: String,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
}

struct Connection {
    organization_id: String,
    user_id: String,
    frames: mpsc::Sender<String>,
}

/// A registered connection's handle: its id and the frames queued for it.
///
/// The receiver yields `None` once the hub drops the connection.
pub struct Registration {
    pub id: ConnectionId,
    pub frames: mpsc::Receiver<String>,
}

/// Cloneable handle to the hub task.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    next_id: Arc<AtomicU64>,
    connection_buffer: usize,
}

impl Hub {
    /// Spawn the hub task. It runs until `cancel` fires.
    pub fn spawn(config: &HubConfig, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let handle = tokio::spawn(run(rx, cancel));
        let hub = Self {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            connection_buffer: config.connection_buffer.max(1),
        };
        (hub, handle)
    }

    pub async fn register(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> Result<Registration, CourierError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (frames_tx, frames_rx) = mpsc::channel(self.connection_buffer);
        self.send(HubCommand::Register {
            id,
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            frames: frames_tx,
        })
        .await?;
        Ok(Registration {
            id,
            frames: frames_rx,
        })
    }

    pub async fn unregister(&self, id: ConnectionId) {
        // A stopped hub has already forgotten every connection.
        let _ = self.send(HubCommand::Unregister { id }).await;
    }

    /// Queue `payload` for every connection of `organization_id`.
    pub async fn broadcast(&self, organization_id: &str, payload: String) -> Result<(), CourierError> {
        self.send(HubCommand::Broadcast {
            organization_id: organization_id.to_string(),
            payload,
        })
        .await
    }

    pub async fn connection_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.send(HubCommand::Count { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    async fn send(&self, command: HubCommand) -> Result<(), CourierError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CourierError::Internal("connection hub is not running".into()))
    }
}

#[async_trait]
impl EventSink for Hub {
    async fn deliver(&self, event: BusEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to encode hub frame");
                return;
            }
        };
        if let Err(e) = self.broadcast(event.organization_id(), payload).await {
            debug!(event = event.name(), error = %e, "hub dropped event");
        }
    }
}

async fn run(mut commands: mpsc::Receiver<HubCommand>, cancel: CancellationToken) {
    let mut connections: HashMap<ConnectionId, Connection> = HashMap::new();
    info!("connection hub started");

    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            HubCommand::Register {
                id,
                organization_id,
                user_id,
                frames,
            } => {
                debug!(connection_id = id, %organization_id, %user_id, "connection registered");
                connections.insert(
                    id,
                    Connection {
                        organization_id,
                        user_id,
                        frames,
                    },
                );
            }
            HubCommand::Unregister { id } => {
                if connections.remove(&id).is_some() {
                    debug!(connection_id = id, "connection unregistered");
                }
            }
            HubCommand::Broadcast {
                organization_id,
                payload,
            } => broadcast(&mut connections, &organization_id, &payload),
            HubCommand::Count { reply } => {
                let _ = reply.send(connections.len());
            }
        }
    }

    info!(connections = connections.len(), "connection hub stopped");
}

fn broadcast(
    connections: &mut HashMap<ConnectionId, Connection>,
    organization_id: &str,
    payload: &str,
) {
    connections.retain(|id, conn| {
        if conn.organization_id != organization_id {
            return true;
        }
        match conn.frames.try_send(payload.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    connection_id = *id,
                    organization_id,
                    user_id = %conn.user_id,
                    "dropping slow connection"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(connection_id = *id, "connection already closed");
                false
            }
        }
    });
}
