// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cancellable fixed-interval runner for periodic tasks.

use std::sync::Arc;
use std::time::Duration;

use courier_core::PeriodicTask;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs one task every `interval` until cancelled.
///
/// Passes run inline on the ticking task, so they never overlap: a pass that
/// outlasts the interval causes the missed ticks to be skipped. Cancellation
/// stops scheduling new passes and lets an in-flight pass finish.
pub struct PeriodicRunner {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
}

impl PeriodicRunner {
    pub fn new(task: Arc<dyn PeriodicTask>, interval: Duration) -> Self {
        Self {
            task,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) {
        let name = self.task.name().to_string();
        info!(task = %name, interval_ms = self.interval.as_millis() as u64, "periodic task started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.task.run_once().await {
                Ok(0) => debug!(task = %name, "periodic pass found nothing to do"),
                Ok(acted) => info!(task = %name, acted, "periodic pass complete"),
                Err(e) => warn!(task = %name, error = %e, "periodic pass failed"),
            }
        }
        info!(task = %name, "periodic task stopped");
    }
}
