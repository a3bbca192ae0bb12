//! Chat platform payload formatting
//!
//! The destination URL picks the payload shape. Rules are tried in order and
//! the first match wins; anything unmatched receives the flat generic payload.

use super::local_datetime;
use crate::models::{capitalize, AlertEvent};
use chrono::{Local, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

const APP_NAME: &str = "Resource Guardian";

/// Generic webhook body, also the input to every platform formatter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub server: String,
    pub timestamp: i64,
    pub datetime: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
}

impl WebhookPayload {
    pub fn from_alert(alert: &AlertEvent, server: &str) -> Self {
        Self {
            server: server.to_string(),
            timestamp: alert.timestamp,
            datetime: local_datetime(alert.timestamp),
            alert_type: alert.metric_type.as_str().to_string(),
            severity: alert.severity.as_str().to_string(),
            message: alert.message.clone(),
            metric_value: alert.metric_value,
            threshold_value: alert.threshold_value,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity == "critical"
    }
}

/// Known webhook flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Slack,
    Discord,
    Teams,
    Generic,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Slack => "slack",
            Platform::Discord => "discord",
            Platform::Teams => "teams",
            Platform::Generic => "generic",
        };
        f.write_str(name)
    }
}

struct PlatformRule {
    platform: Platform,
    matches: fn(&str) -> bool,
    format: fn(&WebhookPayload) -> Value,
}

static RULES: &[PlatformRule] = &[
    PlatformRule {
        platform: Platform::Slack,
        matches: is_slack,
        format: slack,
    },
    PlatformRule {
        platform: Platform::Discord,
        matches: is_discord,
        format: discord,
    },
    PlatformRule {
        platform: Platform::Teams,
        matches: is_teams,
        format: teams,
    },
];

fn is_slack(url: &str) -> bool {
    url.contains("hooks.slack.com")
}

fn is_discord(url: &str) -> bool {
    url.contains("discord.com/api/webhooks")
}

// Covers both webhook.office.com and legacy outlook.office.com connectors
fn is_teams(url: &str) -> bool {
    url.contains("office.com")
}

impl Platform {
    /// Detect the platform from a webhook URL (case-sensitive)
    pub fn detect(url: &str) -> Platform {
        RULES
            .iter()
            .find(|rule| (rule.matches)(url))
            .map(|rule| rule.platform)
            .unwrap_or(Platform::Generic)
    }
}

/// Render the body for `url`, returning the detected platform with it
pub fn render(url: &str, payload: &WebhookPayload) -> (Platform, Value) {
    match RULES.iter().find(|rule| (rule.matches)(url)) {
        Some(rule) => (rule.platform, (rule.format)(payload)),
        None => (Platform::Generic, generic(payload)),
    }
}

fn generic(payload: &WebhookPayload) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}

fn slack(payload: &WebhookPayload) -> Value {
    let (color, emoji) = if payload.is_critical() {
        ("danger", ":rotating_light:")
    } else {
        ("warning", ":warning:")
    };

    json!({
        "username": APP_NAME,
        "icon_emoji": ":shield:",
        "attachments": [{
            "color": color,
            "title": format!("{} {} Alert", emoji, capitalize(&payload.severity)),
            "text": payload.message,
            "fields": [
                { "title": "Server", "value": payload.server, "short": true },
                { "title": "Time", "value": payload.datetime, "short": true },
                { "title": "Type", "value": capitalize(&payload.alert_type), "short": true },
                { "title": "Value", "value": percent(payload.metric_value), "short": true }
            ],
            "footer": APP_NAME,
            "ts": payload.timestamp
        }]
    })
}

fn discord(payload: &WebhookPayload) -> Value {
    let color: u32 = if payload.is_critical() { 15_158_332 } else { 16_776_960 };

    json!({
        "username": APP_NAME,
        "embeds": [{
            "title": format!(
                "{} Alert: {}",
                capitalize(&payload.severity),
                capitalize(&payload.alert_type)
            ),
            "description": payload.message,
            "color": color,
            "fields": [
                { "name": "Server", "value": payload.server, "inline": true },
                { "name": "Time", "value": payload.datetime, "inline": true },
                { "name": "Current Value", "value": percent(payload.metric_value), "inline": true },
                { "name": "Threshold", "value": percent(payload.threshold_value), "inline": true }
            ],
            "footer": { "text": APP_NAME },
            "timestamp": rfc3339(payload.timestamp)
        }]
    })
}

fn teams(payload: &WebhookPayload) -> Value {
    let color = if payload.is_critical() { "FF0000" } else { "FFA500" };

    json!({
        "@type": "MessageCard",
        "@context": "https://schema.org/extensions",
        "summary": payload.message,
        "themeColor": color,
        "title": "Resource Guardian Alert",
        "sections": [{
            "activityTitle": format!(
                "{} - {}",
                capitalize(&payload.severity),
                capitalize(&payload.alert_type)
            ),
            "activitySubtitle": payload.server,
            "activityImage": "https://via.placeholder.com/64/FF0000/FFFFFF?text=!",
            "facts": [
                { "name": "Time", "value": payload.datetime },
                { "name": "Message", "value": payload.message },
                { "name": "Current Value", "value": percent(payload.metric_value) },
                { "name": "Threshold", "value": percent(payload.threshold_value) }
            ],
            "markdown": true
        }]
    })
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

fn rfc3339(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
        .unwrap_or_default()
}
