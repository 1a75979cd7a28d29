// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier worker` command implementation.
//!
//! Runs one worker pool against the shared queue. Stats go through the
//! outbox table so the server process can forward them to dashboards.

use std::sync::Arc;

use courier_bus::{EventPublisher, OutboxBus};
use courier_config::model::{BusMode, CourierConfig};
use courier_core::CourierError;
use courier_dispatch::CampaignController;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::runtime;
use crate::shutdown;

pub async fn run_worker(
    config: CourierConfig,
    concurrency: Option<usize>,
) -> Result<(), CourierError> {
    let concurrency = concurrency.unwrap_or(config.worker.concurrency);
    if concurrency == 0 {
        return Err(CourierError::Config("--concurrency must be at least 1".into()));
    }
    info!(concurrency, "starting courier worker");

    if config.bus.mode == BusMode::Local {
        warn!("bus.mode = \"local\" cannot reach the server from a worker process; publishing to the outbox");
    }

    let cancel = shutdown::install_signal_handler();
    let storage = runtime::open_storage(&config).await?;
    let publisher: Arc<dyn EventPublisher> = Arc::new(OutboxBus::new(storage.clone()));

    let queue = runtime::job_queue(&config, &storage);
    let controller = Arc::new(CampaignController::new(
        storage.clone(),
        publisher.clone(),
        queue.clone(),
    ));
    let pool = runtime::worker_pool(
        &config,
        queue.clone(),
        storage.clone(),
        publisher.clone(),
        concurrency,
    )?;

    let mut tasks = JoinSet::new();
    for runner in
        runtime::campaign_maintenance(&config, queue, storage.clone(), publisher, controller)
    {
        tasks.spawn(runner.run(cancel.clone()));
    }

    pool.run(cancel.clone()).await;

    cancel.cancel();
    runtime::drain(tasks).await;
    runtime::close_storage(&storage).await;
    info!("courier worker shutdown complete");
    Ok(())
}
