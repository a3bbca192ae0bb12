//! Alert notification dispatch
//!
//! Two channels exist: email and webhook. A channel is attempted when its
//! toggle is on and a destination is configured. Channels are dispatched
//! concurrently and never affect each other; the aggregate result is the AND
//! of every attempted channel. Delivery is at-most-once with no retry.

mod email;
mod platforms;
mod webhook;

pub use email::{
    recommendations, render_body, render_subject, validate_address, EmailMessage, Mailer,
    SmtpMailer,
};
pub use platforms::{render as render_webhook, Platform, WebhookPayload};
pub use webhook::{validate_url, WebhookSender, DEFAULT_WEBHOOK_TIMEOUT};

use crate::models::AlertEvent;
use crate::settings::Settings;
use chrono::{Local, TimeZone};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build email: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

/// Notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Webhook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Webhook => "webhook",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one delivery attempt
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-channel results of one dispatch; skipped channels are absent
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    /// True when every attempted channel delivered
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.delivered)
    }

    pub fn failed_channels(&self) -> Vec<Channel> {
        self.outcomes
            .iter()
            .filter(|o| !o.delivered)
            .map(|o| o.channel)
            .collect()
    }

    pub fn outcome(&self, channel: Channel) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

/// Delivers alerts over the configured channels
pub struct Notifier {
    server_name: String,
    sender: String,
    mailer: Arc<dyn Mailer>,
    webhook: WebhookSender,
}

impl Notifier {
    pub fn new(
        server_name: impl Into<String>,
        mailer: Arc<dyn Mailer>,
        webhook: WebhookSender,
    ) -> Self {
        let server_name = server_name.into();
        let sender = format!("Resource Guardian <noreply@{}>", server_name);

        Self {
            server_name,
            sender,
            mailer,
            webhook,
        }
    }

    /// Override the default `noreply@<server>` sender mailbox
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Send `alert` through every enabled channel in `settings`
    pub async fn dispatch(&self, alert: &AlertEvent, settings: &Settings) -> DispatchReport {
        let email = async {
            if !settings.email_enabled() {
                return None;
            }
            let Some(address) = settings.alert_email() else {
                warn!(channel = "email", "Email alerts enabled but no address configured");
                return None;
            };
            Some(outcome(Channel::Email, address, self.send_email(alert, address).await))
        };

        let webhook = async {
            if !settings.webhook_enabled() {
                return None;
            }
            let Some(url) = settings.webhook_url() else {
                warn!(channel = "webhook", "Webhook alerts enabled but no URL configured");
                return None;
            };
            Some(outcome(
                Channel::Webhook,
                url,
                self.send_webhook(alert, url).await.map(|_| ()),
            ))
        };

        let (email, webhook) = tokio::join!(email, webhook);

        DispatchReport {
            outcomes: [email, webhook].into_iter().flatten().collect(),
        }
    }

    /// Render and send `alert` to `address`
    pub async fn send_email(&self, alert: &AlertEvent, address: &str) -> Result<(), NotifyError> {
        let to = validate_address(address)?;

        let message = EmailMessage {
            from: self.sender.clone(),
            to: to.to_string(),
            subject: render_subject(alert),
            body: render_body(alert, &self.server_name),
        };

        self.mailer.send(&message).await
    }

    /// Format `alert` for the platform behind `url` and POST it
    pub async fn send_webhook(
        &self,
        alert: &AlertEvent,
        url: &str,
    ) -> Result<Platform, NotifyError> {
        let target = validate_url(url)?;
        let payload = WebhookPayload::from_alert(alert, &self.server_name);
        let (platform, body) = render_webhook(url, &payload);

        self.webhook.post(&target, &body).await?;
        Ok(platform)
    }

    /// Send the synthetic test alert by email, ignoring channel toggles
    pub async fn test_email(&self, address: &str) -> Result<(), NotifyError> {
        let alert = AlertEvent::test_alert(chrono::Utc::now().timestamp());
        self.send_email(&alert, address).await
    }

    /// Send the synthetic test alert to a webhook, ignoring channel toggles
    pub async fn test_webhook(&self, url: &str) -> Result<Platform, NotifyError> {
        let alert = AlertEvent::test_alert(chrono::Utc::now().timestamp());
        self.send_webhook(&alert, url).await
    }
}

fn outcome(channel: Channel, destination: &str, result: Result<(), NotifyError>) -> ChannelOutcome {
    match result {
        Ok(()) => {
            info!(channel = %channel, destination = %destination, "Alert notification sent");
            ChannelOutcome {
                channel,
                delivered: true,
                error: None,
            }
        }
        Err(e) => {
            warn!(
                channel = %channel,
                destination = %destination,
                error = %e,
                "Alert notification failed"
            );
            ChannelOutcome {
                channel,
                delivered: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// `Y-m-d H:i:s` in the host's local time zone
pub(crate) fn local_datetime(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
