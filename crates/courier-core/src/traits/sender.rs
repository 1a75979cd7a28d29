// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound messaging provider capability.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Account, Template, TemplateParams};

/// Sends one templated message through the external provider.
///
/// Implementations return the provider's message id on success. A throttled
/// request is reported as [`CourierError::RateLimited`]; every other failure
/// is treated as a terminal outcome for the recipient.
#[async_trait]
pub trait MessageSender: PluginAdapter {
    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        template: &Template,
        params: &TemplateParams,
    ) -> Result<String, CourierError>;
}
