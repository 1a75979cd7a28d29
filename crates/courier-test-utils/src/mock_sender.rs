// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock message sender for deterministic testing.
//!
//! `MockSender` implements `MessageSender` with scripted replies, enabling
//! dispatch tests without calling the provider.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::traits::adapter::PluginAdapter;
use courier_core::traits::sender::MessageSender;
use courier_core::types::{Account, AdapterType, HealthStatus, Template, TemplateParams};
use courier_core::CourierError;

/// A scripted reply for one send call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Succeed with a generated provider message id.
    Ok,
    /// Fail with a provider error carrying this text.
    Fail(String),
    /// Report provider throttling.
    RateLimited(Option<Duration>),
}

/// One captured send call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub account_name: String,
    pub recipient: String,
    pub template_name: String,
    pub params: TemplateParams,
    pub provider_message_id: Option<String>,
}

/// A mock sender that replays scripted replies.
///
/// Replies are popped from a FIFO queue. Per-recipient failures set with
/// [`MockSender::fail_recipient`] take precedence. When nothing is scripted
/// the send succeeds.
pub struct MockSender {
    replies: Mutex<VecDeque<MockReply>>,
    failing: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<SentMessage>>,
    next_id: AtomicU64,
}

impl MockSender {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            failing: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a mock sender pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            ..Self::new()
        }
    }

    pub async fn push_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Make every send to `recipient` fail with `error`.
    pub async fn fail_recipient(&self, recipient: &str, error: &str) {
        self.failing
            .lock()
            .await
            .insert(recipient.to_string(), error.to_string());
    }

    /// All send calls made so far, including failed ones.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn send_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    async fn next_reply(&self, recipient: &str) -> MockReply {
        if let Some(error) = self.failing.lock().await.get(recipient) {
            return MockReply::Fail(error.clone());
        }
        self.replies.lock().await.pop_front().unwrap_or(MockReply::Ok)
    }
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSender {
    fn name(&self) -> &str {
        "mock-sender"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sender
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        template: &Template,
        params: &TemplateParams,
    ) -> Result<String, CourierError> {
        let reply = self.next_reply(recipient).await;
        let result = match reply {
            MockReply::Ok => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(format!("wamid.mock.{n}"))
            }
            MockReply::Fail(error) => Err(CourierError::provider(error)),
            MockReply::RateLimited(retry_after) => {
                Err(CourierError::RateLimited { retry_after })
            }
        };
        self.sent.lock().await.push(SentMessage {
            account_name: account.name.clone(),
            recipient: recipient.to_string(),
            template_name: template.name.clone(),
            params: params.clone(),
            provider_message_id: result.as_ref().ok().cloned(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: "a-1".into(),
            organization_id: "org".into(),
            name: "main".into(),
            phone_number_id: "100".into(),
            access_token: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn template() -> Template {
        Template {
            id: "t-1".into(),
            organization_id: "org".into(),
            name: "promo".into(),
            language: "en".into(),
            body: "Hi {{1}}".into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn scripted_replies_then_default_success() {
        let sender = MockSender::with_replies(vec![MockReply::Fail("bad number".into())]);
        let params = TemplateParams::new();

        let err = sender
            .send(&account(), "1555", &template(), &params)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad number"));

        let id = sender
            .send(&account(), "1555", &template(), &params)
            .await
            .unwrap();
        assert!(id.starts_with("wamid.mock."));
        assert_eq!(sender.send_count().await, 2);
    }

    #[tokio::test]
    async fn per_recipient_failure_wins() {
        let sender = MockSender::new();
        sender.fail_recipient("1666", "blocked").await;
        let params = TemplateParams::new();
        assert!(sender.send(&account(), "1666", &template(), &params).await.is_err());
        assert!(sender.send(&account(), "1555", &template(), &params).await.is_ok());
        let sent = sender.sent().await;
        assert!(sent[0].provider_message_id.is_none());
        assert!(sent[1].provider_message_id.is_some());
    }
}
