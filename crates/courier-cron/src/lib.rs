// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timer-driven maintenance for Courier.
//!
//! [`PeriodicRunner`] drives any [`PeriodicTask`](courier_core::PeriodicTask)
//! on a fixed interval; [`SlaSweeper`] is the task that flags agent transfers
//! crossing their pickup or resolution thresholds.

pub mod runner;
pub mod sla;

pub use runner::PeriodicRunner;
pub use sla::SlaSweeper;
