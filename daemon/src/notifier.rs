use alert_modem::{NotificationSink, NotifyError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notifications as text messages to a group-chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// An empty `url` leaves notifications in the log only.
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!("[notification] {text}");

        if self.url.is_empty() {
            debug!("no webhook configured, notification only logged");
            return Ok(());
        }

        let payload = json!({
            "msgtype": "text",
            "text": { "content": text },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("webhook notification delivered");
        Ok(())
    }
}
