// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background subscriber that forwards bus events to a sink.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier_core::StorageAdapter;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::BusEvent;
use crate::local::LocalBus;
use crate::publisher::EventSink;

const OUTBOX_BATCH: i64 = 256;
const PRUNE_EVERY: Duration = Duration::from_secs(60);

/// Where the subscriber reads events from.
#[derive(Clone)]
pub enum SubscriberSource {
    /// Same-process broadcast bus.
    Local(Arc<LocalBus>),
    /// Shared outbox table, polled from the newest id seen at start.
    Outbox {
        storage: Arc<dyn StorageAdapter>,
        poll_interval: Duration,
        retention: Duration,
    },
}

/// Forwards every event from the source to the sink until stopped.
///
/// `start` and `stop` are idempotent. Events published while the subscriber
/// is stopped are not replayed.
pub struct StatsSubscriber {
    source: SubscriberSource,
    sink: Arc<dyn EventSink>,
    running: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl StatsSubscriber {
    pub fn new(source: SubscriberSource, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            sink,
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|(_, h)| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Spawn the forwarding loop. A second call while running is a no-op.
    pub fn start(&self) {
        let Ok(mut guard) = self.running.lock() else {
            warn!("stats subscriber state poisoned; not starting");
            return;
        };
        if let Some((_, handle)) = guard.as_ref()
            && !handle.is_finished()
        {
            debug!("stats subscriber already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = match &self.source {
            SubscriberSource::Local(bus) => {
                // Subscribe before spawning so nothing published after start is missed.
                let rx = bus.subscribe();
                tokio::spawn(run_local(rx, self.sink.clone(), cancel.clone()))
            }
            SubscriberSource::Outbox {
                storage,
                poll_interval,
                retention,
            } => tokio::spawn(run_outbox(
                storage.clone(),
                *poll_interval,
                *retention,
                self.sink.clone(),
                cancel.clone(),
            )),
        };
        info!("stats subscriber started");
        *guard = Some((cancel, handle));
    }

    /// Stop the forwarding loop and wait for it to exit.
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some((cancel, handle)) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "stats subscriber task ended abnormally");
            }
            info!("stats subscriber stopped");
        }
    }
}

async fn run_local(
    mut rx: tokio::sync::broadcast::Receiver<BusEvent>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => sink.deliver(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "stats subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn run_outbox(
    storage: Arc<dyn StorageAdapter>,
    poll_interval: Duration,
    retention: Duration,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
) {
    let mut cursor = match storage.latest_bus_event_id().await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "failed to read outbox position; will retry");
            None
        }
    };
    let mut last_prune = Instant::now();
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let after = match cursor {
            Some(id) => id,
            None => match storage.latest_bus_event_id().await {
                Ok(id) => {
                    cursor = Some(id);
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read outbox position");
                    continue;
                }
            },
        };

        match storage.bus_events_after(after, OUTBOX_BATCH).await {
            Ok(rows) => {
                for (id, payload) in rows {
                    cursor = Some(id);
                    match serde_json::from_str::<BusEvent>(&payload) {
                        Ok(event) => sink.deliver(event).await,
                        Err(e) => warn!(id, error = %e, "skipping malformed bus event"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to poll bus outbox"),
        }

        if last_prune.elapsed() >= PRUNE_EVERY {
            last_prune = Instant::now();
            match storage.prune_bus_events(retention).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned bus outbox"),
                Err(e) => warn!(error = %e, "failed to prune bus outbox"),
            }
        }
    }
}
