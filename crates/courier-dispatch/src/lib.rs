// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous dispatch pipeline for Courier.
//!
//! A [`CampaignController`] enqueues one [`SendJob`](courier_core::SendJob) per
//! pending recipient onto the durable [`JobQueue`]. A [`WorkerPool`] runs N
//! consumer loops that hand each delivery to the [`SendWorker`], which sends,
//! records the outcome with guarded writes, and asks the
//! [`CompletionDetector`] whether the campaign is finished.
//!
//! The [`TransferQueue`] hands conversations to human agents with
//! claim-based exclusivity.

pub mod completion;
pub mod contact;
pub mod controller;
pub mod handoff;
pub mod pool;
pub mod queue;
pub mod reconcile;
pub mod render;
pub mod sender;
pub mod worker;

pub use completion::{CompletionCheck, CompletionDetector};
pub use controller::{CampaignController, NewCampaign, NewRecipient};
pub use handoff::TransferQueue;
pub use pool::WorkerPool;
pub use queue::{Delivery, JobHandler, JobOutcome, JobQueue};
pub use reconcile::{CampaignReconciler, ScheduledStarter};
pub use sender::HttpSender;
pub use worker::SendWorker;
