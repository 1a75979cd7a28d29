// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for Courier.
//!
//! REST routes drive the campaign lifecycle, the agent transfer queue and
//! delivery receipts. Dashboards connect over `/ws` and receive live events
//! pushed by the connection [`Hub`], which is fed by the stats subscriber
//! through its [`EventSink`](courier_bus::EventSink) implementation.

pub mod auth;
pub mod handlers;
pub mod hub;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use hub::{ConnectionId, Hub, Registration};
pub use server::{GatewayState, router, start_server};
