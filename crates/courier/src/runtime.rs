// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring shared by the `serve` and `worker` commands.

use std::sync::Arc;

use courier_bus::EventPublisher;
use courier_config::model::CourierConfig;
use courier_core::{CourierError, StorageAdapter};
use courier_cron::PeriodicRunner;
use courier_dispatch::{
    CampaignController, CampaignReconciler, CompletionDetector, HttpSender, JobQueue,
    ScheduledStarter, SendWorker, WorkerPool,
};
use courier_storage::SqliteStorage;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Open the database and run pending migrations.
pub async fn open_storage(config: &CourierConfig) -> Result<Arc<dyn StorageAdapter>, CourierError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");
    Ok(Arc::new(storage))
}

pub fn job_queue(config: &CourierConfig, storage: &Arc<dyn StorageAdapter>) -> Arc<JobQueue> {
    Arc::new(JobQueue::new(storage.clone(), config.queue.clone()))
}

/// A pool of `concurrency` consumer loops sending through the HTTP provider.
pub fn worker_pool(
    config: &CourierConfig,
    queue: Arc<JobQueue>,
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    concurrency: usize,
) -> Result<WorkerPool, CourierError> {
    let sender = Arc::new(HttpSender::new(&config.provider)?);
    let worker = Arc::new(SendWorker::new(storage, sender, publisher));
    Ok(WorkerPool::new(
        queue,
        worker,
        concurrency,
        config.worker.restart_delay(),
    ))
}

/// Campaign reconciler and scheduled-campaign starter.
pub fn campaign_maintenance(
    config: &CourierConfig,
    queue: Arc<JobQueue>,
    storage: Arc<dyn StorageAdapter>,
    publisher: Arc<dyn EventPublisher>,
    controller: Arc<CampaignController>,
) -> Vec<PeriodicRunner> {
    let interval = config.reconcile.interval();
    let reconciler = CampaignReconciler::new(
        storage.clone(),
        queue,
        CompletionDetector::new(storage.clone(), publisher),
    );
    let starter = ScheduledStarter::new(storage, controller);
    vec![
        PeriodicRunner::new(Arc::new(reconciler), interval),
        PeriodicRunner::new(Arc::new(starter), interval),
    ]
}

/// Wait for every background task to exit.
pub async fn drain(mut tasks: JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "background task panicked");
        }
    }
}

/// Checkpoint and close the database.
pub async fn close_storage(storage: &Arc<dyn StorageAdapter>) {
    match storage.close().await {
        Ok(()) => info!("storage closed"),
        Err(e) => error!(error = %e, "failed to close storage cleanly"),
    }
}
