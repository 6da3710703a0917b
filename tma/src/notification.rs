//! Push notifications via ServerChan (Server酱).
//!
//! A push is a form POST of `{text, desp}` to `{endpoint}/{sckey}.send`;
//! `desp` may be markdown. Delivery is retried a bounded number of times
//! with linear backoff.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tma_common::{Error, NotificationConfig, Result};

/// Something that delivers a titled message to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Fails with a configuration error when no
    /// delivery key is configured.
    async fn push(&self, title: &str, content: &str) -> Result<()>;
}

/// Response from ServerChan
#[derive(Debug, Deserialize)]
struct SendResponse {
    /// 0 on success
    #[serde(default)]
    errno: i64,
    #[serde(default)]
    errmsg: Option<String>,
}

/// ServerChan push client.
pub struct ServerChanClient {
    sckey: Option<String>,
    endpoint: String,
    retry_count: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl ServerChanClient {
    /// Create from notification config
    pub fn new(config: &NotificationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            sckey: config
                .sckey
                .as_ref()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            retry_count: config.retry_count.max(1),
            retry_delay: Duration::from_millis(500),
            client,
        }
    }

    /// Base delay between attempts; attempt `n` waits `n × delay`
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Check if a send key is configured
    pub fn is_enabled(&self) -> bool {
        self.sckey.is_some()
    }

    /// Try to send a single request
    async fn try_send(&self, url: &str, title: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .form(&[("text", title), ("desp", content)])
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!("HTTP {}: {}", status, error_text)));
        }

        let result: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::Notification(format!("Invalid response: {}", e)))?;

        if result.errno == 0 {
            Ok(())
        } else {
            Err(Error::Notification(format!(
                "Send failed: errno={} {}",
                result.errno,
                result.errmsg.unwrap_or_default()
            )))
        }
    }
}

#[async_trait]
impl Notifier for ServerChanClient {
    async fn push(&self, title: &str, content: &str) -> Result<()> {
        let sckey = self.sckey.as_deref().ok_or_else(|| {
            Error::Configuration(
                "ServerChan key not configured: set notification.sckey or TMA_SCKEY".into(),
            )
        })?;

        let url = format!("{}/{}.send", self.endpoint, sckey);
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(&url, title, content).await {
                Ok(()) => {
                    tracing::info!(title = %title, attempt, "Notification pushed");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %e,
                        "Failed to push notification, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Notification("Unknown error".into())))
    }
}

// ============================================================================
// Tests
// ============================================================================
