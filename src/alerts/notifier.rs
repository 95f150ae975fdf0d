use crate::error::AlertError;
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Sink for alert messages
///
/// Implementations report failures through the returned `Result` and never
/// panic; callers log the error and carry on.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn send(&self, message: &str) -> Result<(), AlertError>;
}

/// JSON body posted to the webhook
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Slack-style incoming-webhook notifier
///
/// Posts `{"text": message}` to the configured URL. Without a URL every send
/// logs a warning and succeeds, so detection keeps running with delivery off.
/// Requests run on a private single-threaded tokio runtime and block the
/// caller for at most the configured timeout.
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    client: Client,
    runtime: Runtime,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Arguments
    ///
    /// * `webhook_url` - Destination URL, `None` disables delivery
    /// * `timeout` - Upper bound for a single delivery attempt
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if the HTTP client or its runtime cannot be built.
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(webhook_url, client)
    }

    /// Create a notifier around a preconfigured HTTP client
    pub fn with_client(webhook_url: Option<String>, client: Client) -> Result<Self, AlertError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        Ok(Self {
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            client,
            runtime,
        })
    }

    /// Create a notifier with delivery turned off
    pub fn disabled() -> Result<Self, AlertError> {
        Self::new(None, Duration::from_secs(10))
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, url: &str, message: &str) -> Result<(), AlertError> {
        let response = self
            .client
            .post(url)
            .json(&WebhookPayload { text: message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AlertError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, message: &str) -> Result<(), AlertError> {
        let Some(url) = self.webhook_url.as_deref() else {
            warn!("SLACK_WEBHOOK_URL not set, skipping alert: {}", message);
            return Ok(());
        };

        self.runtime.block_on(self.post(url, message))?;
        debug!("Delivered alert: {}", message);
        Ok(())
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
