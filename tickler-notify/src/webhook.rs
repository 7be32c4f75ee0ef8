//! Webhook channel: POSTs the reminder as JSON.
//!
//! Body: `{"recipient": "...", "subject": "...", "body": "..."}`. Any non-2xx
//! response is a failed delivery.

use async_trait::async_trait;
use reqwest::Url;
use tickler_core::{Notification, Notifier, NotifyError};
use tracing::debug;

use crate::ConfigError;
use crate::address::is_valid_email;

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url.trim()).map_err(|e| ConfigError::Invalid {
            channel: "webhook",
            setting: "webhook_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                channel: "webhook",
                setting: "webhook_url",
                reason: format!("unsupported scheme: {}", url.scheme()),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn channel(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        if !is_valid_email(&message.recipient) {
            return Err(NotifyError::InvalidRecipient(message.recipient.clone()));
        }

        let resp = self
            .client
            .post(self.url.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected(format!("{status}: {text}")));
        }

        debug!(url = %self.url, to = %message.recipient, "reminder posted to webhook");
        Ok(())
    }
}
