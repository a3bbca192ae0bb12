//! Webhook channel: HTTP JSON delivery

use super::NotifyError;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Default request timeout for webhook deliveries
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over a shared HTTP client. Certificate verification stays on.
#[derive(Debug, Clone)]
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("resource-guardian/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// POST `body` as JSON. Any non-2xx status is a delivery failure.
    pub async fn post(&self, url: &Url, body: &Value) -> Result<(), NotifyError> {
        let response = self.client.post(url.clone()).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Accept only absolute http(s) URLs with a host
pub fn validate_url(raw: &str) -> Result<Url, NotifyError> {
    let url = Url::parse(raw.trim()).map_err(|_| NotifyError::InvalidUrl(raw.to_string()))?;

    let web_scheme = matches!(url.scheme(), "http" | "https");
    let has_host = url.host_str().map(|h| !h.is_empty()).unwrap_or(false);
    if !web_scheme || !has_host {
        return Err(NotifyError::InvalidUrl(raw.to_string()));
    }

    Ok(url)
}
