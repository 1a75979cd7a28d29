// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the provider's template message API.

use std::time::Duration;

use async_trait::async_trait;
use courier_config::model::ProviderConfig;
use courier_core::{
    Account, AdapterType, CourierError, HealthStatus, MessageSender, PluginAdapter, Template,
    TemplateParams,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::render::param_text;

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessageId>,
}

#[derive(Debug, Deserialize)]
struct SentMessageId {
    id: String,
}

/// Sends template messages through `{base_url}/{phone_number_id}/messages`.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSender {
    pub fn new(config: &ProviderConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CourierError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(recipient: &str, template: &Template, params: &TemplateParams) -> Value {
        let mut ordered: Vec<(u32, &Value)> = params
            .iter()
            .filter_map(|(k, v)| k.parse::<u32>().ok().map(|n| (n, v)))
            .collect();
        ordered.sort_by_key(|(n, _)| *n);
        let parameters: Vec<Value> = ordered
            .into_iter()
            .map(|(_, v)| json!({"type": "text", "text": param_text(v)}))
            .collect();

        let mut template_obj = json!({
            "name": template.name,
            "language": {"code": template.language},
        });
        if !parameters.is_empty() {
            template_obj["components"] = json!([{"type": "body", "parameters": parameters}]);
        }
        json!({
            "messaging_product": "whatsapp",
            "to": recipient,
            "type": "template",
            "template": template_obj,
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpSender {
    fn name(&self) -> &str {
        "http-sender"
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
impl MessageSender for HttpSender {
    async fn send(
        &self,
        account: &Account,
        recipient: &str,
        template: &Template,
        params: &TemplateParams,
    ) -> Result<String, CourierError> {
        let token = account.access_token.as_deref().ok_or_else(|| {
            CourierError::provider(format!("account '{}' has no access token", account.name))
        })?;
        let url = format!("{}/{}/messages", self.base_url, account.phone_number_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&Self::request_body(recipient, template, params))
            .send()
            .await
            .map_err(|e| CourierError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, account = %account.name, "provider response received");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(CourierError::RateLimited { retry_after });
        }

        let body = response.text().await.map_err(|e| CourierError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;
        if !status.is_success() {
            return Err(CourierError::provider(format!("API returned {status}: {body}")));
        }

        let parsed: SendResponse = serde_json::from_str(&body).map_err(|e| CourierError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })?;
        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| CourierError::provider("API response carried no message id"))
    }
}
