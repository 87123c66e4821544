//! Outbound alert delivery

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::events::ConnectionEvent;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Server rejected alert with status {0}")]
    Status(reqwest::StatusCode),
}

/// Delivers a connection event to a remote collector
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &ConnectionEvent) -> Result<(), NotifyError>;

    /// Where alerts are sent, for log messages
    fn endpoint(&self) -> &str;
}

/// POSTs each event as JSON to a fixed URL
pub struct HttpNotifier {
    client: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, event: &ConnectionEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
