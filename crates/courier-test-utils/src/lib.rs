// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockSender`] - Mock provider sender with scripted replies and capture
//! - [`RecordingPublisher`] - Bus publisher that keeps every event in memory
//! - [`TestHarness`] - Temp SQLite storage plus the mocks above

pub mod harness;
pub mod mock_sender;
pub mod recording_publisher;

pub use harness::{TEST_ACCOUNT, TEST_TEMPLATE, TEST_TEMPLATE_BODY, TestHarness};
pub use mock_sender::{MockReply, MockSender, SentMessage};
pub use recording_publisher::RecordingPublisher;
