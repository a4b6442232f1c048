use crate::error::NotifyError;
use async_trait::async_trait;
use tracing::info;

/// Where status reports and call announcements are delivered.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Only logs the message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        info!("[notification] {text}");
        Ok(())
    }
}
