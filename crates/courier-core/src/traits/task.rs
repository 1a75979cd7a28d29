// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer-driven maintenance work.

use async_trait::async_trait;

use crate::error::CourierError;

/// One unit of periodic work (SLA scan, reconciliation, scheduled starts).
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run a single pass. Returns the number of items acted upon.
    async fn run_once(&self) -> Result<usize, CourierError>;
}
