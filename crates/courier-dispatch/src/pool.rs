// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker pool: N concurrent consumer loops under one supervisor.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::{JobHandler, JobQueue};

/// Runs `concurrency` consumer loops over one queue.
///
/// A loop that stops on a transient error is logged and restarted after
/// `restart_delay`; all loops exit once the token is cancelled.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    restart_delay: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        handler: Arc<dyn JobHandler>,
        concurrency: usize,
        restart_delay: Duration,
    ) -> Self {
        Self {
            queue,
            handler,
            concurrency: concurrency.max(1),
            restart_delay,
        }
    }

    /// Run until `cancel` fires and every loop has finished its current job.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(queue = self.queue.name(), concurrency = self.concurrency, "worker pool starting");
        let mut loops = JoinSet::new();
        for slot in 0..self.concurrency {
            loops.spawn(supervise(
                slot,
                self.queue.clone(),
                self.handler.clone(),
                self.restart_delay,
                cancel.clone(),
            ));
        }
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "consumer loop panicked");
            }
        }
        info!(queue = self.queue.name(), "worker pool stopped");
    }
}

async fn supervise(
    slot: usize,
    queue: Arc<JobQueue>,
    handler: Arc<dyn JobHandler>,
    restart_delay: Duration,
    cancel: CancellationToken,
) {
    loop {
        match queue.consume(handler.as_ref(), &cancel).await {
            Ok(()) => return,
            Err(e) => {
                warn!(slot, error = %e, "consumer loop stopped; restarting");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(restart_delay) => {}
                }
            }
        }
    }
}
