//! Evaluator notification

use async_trait::async_trait;
use ship_core::{NotificationPayload, NotifierConfig, Result, ShipError};
use std::time::Duration;
use tracing::info;

/// Delivers a deploy result to an evaluator callback
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, payload: &NotificationPayload) -> Result<()>;
}

/// POSTs the payload as JSON. One attempt, no retry.
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    http: reqwest::Client,
}

impl HttpNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShipError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, url: &str, payload: &NotificationPayload) -> Result<()> {
        info!("Notifying evaluator at {}", url);
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ShipError::Notification(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(ShipError::Notification(format!(
                "Evaluator returned {}: {}",
                status, body
            )));
        }

        info!("Evaluator acknowledged ({})", status);
        Ok(())
    }
}
