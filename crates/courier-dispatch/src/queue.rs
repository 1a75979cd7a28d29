// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable multi-consumer job queue with at-least-once delivery.
//!
//! Entries live in the storage backend. A consumer claims one entry at a
//! time, hiding it for the visibility window; if the consumer neither acks
//! nor retries before the window ends, the entry becomes claimable again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::QueueConfig;
use courier_core::{CourierError, QueueEntry, SendJob, StorageAdapter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One delivery of a queued job to a handler.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub entry_id: i64,
    pub job: SendJob,
    /// 1-based count of claims so far, this one included.
    pub attempt: i32,
    pub max_attempts: i32,
}

impl Delivery {
    /// Whether a retry would dead-letter the entry instead of redelivering it.
    pub fn is_final_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// What the handler wants done with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Processing is finished (successfully or with a recorded failure).
    Ack,
    /// Redeliver later. `after` overrides the configured backoff.
    Retry {
        reason: String,
        after: Option<Duration>,
    },
}

/// Capability invoked for every claimed job.
///
/// Returning a transient error ([`CourierError::is_transient`]) stops the
/// consumer loop; the entry is left claimed and reappears after the
/// visibility window.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: &Delivery) -> Result<JobOutcome, CourierError>;
}

/// Typed send-job queue over the storage backend.
pub struct JobQueue {
    storage: Arc<dyn StorageAdapter>,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: QueueConfig) -> Self {
        Self { storage, config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Persist one job. Returns once the write is durable.
    pub async fn enqueue(&self, job: &SendJob) -> Result<i64, CourierError> {
        let payload = encode(job)?;
        self.storage
            .enqueue(&self.config.name, &payload, self.config.max_attempts)
            .await
    }

    /// Persist a batch of jobs in one transaction, preserving order.
    pub async fn enqueue_batch(&self, jobs: &[SendJob]) -> Result<usize, CourierError> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let payloads = jobs.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        self.storage
            .enqueue_batch(&self.config.name, &payloads, self.config.max_attempts)
            .await
    }

    /// Pending plus in-flight entries.
    pub async fn depth(&self) -> Result<i64, CourierError> {
        self.storage.queue_depth(&self.config.name).await
    }

    pub fn backoff(&self, attempt: i32) -> Duration {
        backoff_delay(&self.config, attempt)
    }

    /// Claim and process jobs until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and `Err` when the queue or the
    /// handler hits a transient infrastructure failure. A job being handled
    /// when cancellation arrives is finished first.
    pub async fn consume(
        &self,
        handler: &dyn JobHandler,
        cancel: &CancellationToken,
    ) -> Result<(), CourierError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let entry = self
                .storage
                .claim(&self.config.name, self.config.visibility_timeout())
                .await?;

            let Some(entry) = entry else {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.config.poll_interval()) => continue,
                }
            };

            self.process(entry, handler).await?;
        }
    }

    /// Claim and process at most one job. Returns whether a job was found.
    pub async fn process_next(&self, handler: &dyn JobHandler) -> Result<bool, CourierError> {
        match self
            .storage
            .claim(&self.config.name, self.config.visibility_timeout())
            .await?
        {
            Some(entry) => {
                self.process(entry, handler).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process(&self, entry: QueueEntry, handler: &dyn JobHandler) -> Result<(), CourierError> {
        let job: SendJob = match serde_json::from_str(&entry.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(entry_id = entry.id, error = %e, "burying malformed job payload");
                self.storage
                    .bury(entry.id, &format!("malformed payload: {e}"))
                    .await?;
                return Ok(());
            }
        };

        let delivery = Delivery {
            entry_id: entry.id,
            job,
            attempt: entry.attempts,
            max_attempts: entry.max_attempts,
        };

        match handler.handle(&delivery).await {
            Ok(JobOutcome::Ack) => self.storage.ack(entry.id).await,
            Ok(JobOutcome::Retry { reason, after }) => {
                let delay = after.unwrap_or_else(|| self.backoff(delivery.attempt));
                self.reschedule(&delivery, delay, &reason).await
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                let delay = self.backoff(delivery.attempt);
                self.reschedule(&delivery, delay, &e.to_string()).await
            }
        }
    }

    async fn reschedule(
        &self,
        delivery: &Delivery,
        delay: Duration,
        reason: &str,
    ) -> Result<(), CourierError> {
        let requeued = self.storage.retry(delivery.entry_id, delay, reason).await?;
        if requeued {
            debug!(
                entry_id = delivery.entry_id,
                campaign_id = %delivery.job.campaign_id,
                attempt = delivery.attempt,
                delay_ms = delay.as_millis() as u64,
                reason,
                "job scheduled for redelivery"
            );
        } else {
            warn!(
                entry_id = delivery.entry_id,
                campaign_id = %delivery.job.campaign_id,
                recipient_id = %delivery.job.recipient_id,
                attempt = delivery.attempt,
                reason,
                "job exhausted its attempts"
            );
        }
        Ok(())
    }
}

/// Retry delay for the given attempt: `retry_backoff * 2^(attempt-1)`, capped.
pub fn backoff_delay(config: &QueueConfig, attempt: i32) -> Duration {
    let base = config.retry_backoff();
    let cap = config.retry_backoff_max();
    let exponent = attempt.saturating_sub(1).clamp(0, 20) as u32;
    base.checked_mul(1u32 << exponent)
        .map_or(cap, |delay| delay.min(cap))
}

fn encode(job: &SendJob) -> Result<String, CourierError> {
    serde_json::to_string(job).map_err(|e| CourierError::Queue {
        message: format!("failed to encode job: {e}"),
    })
}
