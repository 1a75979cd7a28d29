// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod accounts;
pub mod bus_events;
pub mod campaigns;
pub mod contacts;
pub mod messages;
pub mod queue;
pub mod recipients;
pub mod transfers;
