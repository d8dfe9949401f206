//! Feishu (Lark) flow webhook channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::NotifyEvent;
use crate::NotifyChannel;

/// Feishu webhook notification channel.
///
/// Posts `{"msg_type":"text","content":{"text":...}}` and treats anything
/// other than `200 OK` as a delivery failure.
pub struct FeishuChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl FeishuChannel {
    /// Create a Feishu channel with a specific webhook URL.
    #[must_use]
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: Some(webhook_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a channel that is enabled only when a URL is given.
    #[must_use]
    pub fn from_option(webhook_url: Option<String>) -> Self {
        if webhook_url.is_none() {
            debug!("Feishu channel disabled (no webhook URL)");
        }
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn format_payload(event: &NotifyEvent) -> FeishuPayload {
        FeishuPayload {
            msg_type: "text",
            content: FeishuContent { text: event.text() },
        }
    }
}

#[async_trait]
impl NotifyChannel for FeishuChannel {
    fn name(&self) -> &'static str {
        "feishu"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        let webhook_url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("feishu".to_string()))?;

        let payload = Self::format_payload(event);

        debug!(channel = "feishu", event_type = event.kind(), "Sending notification");

        let response = self.client.post(webhook_url).json(&payload).send().await?;

        if response.status() == reqwest::StatusCode::OK {
            debug!(channel = "feishu", "Notification sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "feishu",
                status = %status,
                body = %body,
                "Feishu webhook request failed"
            );

            Err(ChannelError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct FeishuPayload {
    msg_type: &'static str,
    content: FeishuContent,
}

#[derive(Debug, Serialize)]
struct FeishuContent {
    text: String,
}
