// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus for the Courier dispatch service.
//!
//! Workers publish [`BusEvent`]s through an [`EventPublisher`]; the serving
//! process runs a [`StatsSubscriber`] that forwards them to an [`EventSink`]
//! (the live connection hub). Delivery is best-effort: a missed snapshot is
//! superseded by the next one.

pub mod event;
pub mod local;
pub mod outbox;
pub mod publisher;
pub mod subscriber;

pub use event::BusEvent;
pub use local::LocalBus;
pub use outbox::OutboxBus;
pub use publisher::{publish_best_effort, EventPublisher, EventSink};
pub use subscriber::{StatsSubscriber, SubscriberSource};
