// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Starts storage, the connection hub and the stats subscriber that feeds it,
//! the HTTP/WebSocket gateway, `server.embedded_workers` worker pools, and
//! the periodic SLA sweeper, campaign reconciler and scheduled starter.
//! Everything shares one [`CancellationToken`](tokio_util::sync::CancellationToken)
//! cancelled by SIGINT/SIGTERM.

use std::sync::Arc;

use courier_bus::{EventPublisher, LocalBus, OutboxBus, StatsSubscriber, SubscriberSource};
use courier_config::model::{BusMode, CourierConfig};
use courier_core::{CourierError, StorageAdapter};
use courier_cron::{PeriodicRunner, SlaSweeper};
use courier_dispatch::{CampaignController, TransferQueue};
use courier_gateway::{AuthConfig, GatewayState, Hub};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::runtime;
use crate::shutdown;

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    let bearer_token = config
        .server
        .bearer_token
        .clone()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            CourierError::Config(
                "server.bearer_token must be set before the gateway can start".into(),
            )
        })?;

    info!("starting courier serve");

    let cancel = shutdown::install_signal_handler();
    let storage = runtime::open_storage(&config).await?;
    let (publisher, source) = event_bus(&config, &storage);

    let (hub, hub_task) = Hub::spawn(&config.hub, cancel.clone());
    let subscriber = StatsSubscriber::new(source, Arc::new(hub.clone()));
    subscriber.start();

    let queue = runtime::job_queue(&config, &storage);
    let controller = Arc::new(CampaignController::new(
        storage.clone(),
        publisher.clone(),
        queue.clone(),
    ));
    let transfers = Arc::new(TransferQueue::new(storage.clone(), publisher.clone()));

    let mut tasks = JoinSet::new();

    for index in 0..config.server.embedded_workers {
        let pool = runtime::worker_pool(
            &config,
            queue.clone(),
            storage.clone(),
            publisher.clone(),
            config.worker.concurrency,
        )?;
        let pool_cancel = cancel.clone();
        tasks.spawn(async move { pool.run(pool_cancel).await });
        info!(index, "embedded worker started");
    }
    if config.server.embedded_workers == 0 {
        info!("embedded workers disabled");
    }

    if config.sla.enabled {
        let sweeper = SlaSweeper::new(storage.clone(), publisher.clone(), &config.sla);
        let runner = PeriodicRunner::new(Arc::new(sweeper), config.sla.interval());
        tasks.spawn(runner.run(cancel.clone()));
    } else {
        info!("sla sweeper disabled");
    }

    for runner in runtime::campaign_maintenance(
        &config,
        queue.clone(),
        storage.clone(),
        publisher.clone(),
        controller.clone(),
    ) {
        tasks.spawn(runner.run(cancel.clone()));
    }

    let state = GatewayState {
        storage: storage.clone(),
        controller,
        transfers,
        hub,
        auth: AuthConfig::new(Some(bearer_token)),
    };
    let served = courier_gateway::start_server(&config.server, state, cancel.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "gateway stopped with an error");
    }

    cancel.cancel();
    runtime::drain(tasks).await;
    subscriber.stop().await;
    if let Err(e) = hub_task.await {
        error!(error = %e, "connection hub panicked");
    }
    runtime::close_storage(&storage).await;

    info!("courier serve shutdown complete");
    served
}

/// Publisher for this process and the source the subscriber reads from.
fn event_bus(
    config: &CourierConfig,
    storage: &Arc<dyn StorageAdapter>,
) -> (Arc<dyn EventPublisher>, SubscriberSource) {
    match config.bus.mode {
        BusMode::Local => {
            if config.server.embedded_workers == 0 {
                warn!("bus.mode = \"local\" only carries events from embedded workers");
            }
            let bus = Arc::new(LocalBus::new(config.bus.capacity));
            let publisher: Arc<dyn EventPublisher> = bus.clone();
            (publisher, SubscriberSource::Local(bus))
        }
        BusMode::Outbox => {
            let publisher: Arc<dyn EventPublisher> = Arc::new(OutboxBus::new(storage.clone()));
            let source = SubscriberSource::Outbox {
                storage: storage.clone(),
                poll_interval: config.bus.poll_interval(),
                retention: config.bus.retention(),
            };
            (publisher, source)
        }
    }
}
