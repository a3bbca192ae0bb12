//! Email channel: message rendering and SMTP delivery

use super::{local_datetime, NotifyError};
use crate::models::{capitalize, AlertEvent, MetricType, Severity};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const FALLBACK_ADVICE: &str = "Please investigate the issue and take appropriate action.";

/// A fully rendered plain-text email
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail transport
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// SMTP relay transport, usually the local MTA
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Plain (unauthenticated, no TLS) relay, matching a local MTA setup
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .timeout(Some(timeout))
            .build();

        Self { transport }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(message.from.clone()))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(message.to.clone()))?;

        let email = Message::builder()
            .from(from.clone())
            .reply_to(Mailbox::new(None, from.email))
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        Ok(())
    }
}

/// Check that `raw` is a syntactically valid address
pub fn validate_address(raw: &str) -> Result<Address, NotifyError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| NotifyError::InvalidAddress(raw.to_string()))
}

pub fn render_subject(alert: &AlertEvent) -> String {
    format!(
        "[{}] Alert: {}",
        alert.severity.as_str().to_uppercase(),
        alert.metric_type.as_str().to_uppercase()
    )
}

pub fn render_body(alert: &AlertEvent, server_name: &str) -> String {
    let heavy = "=".repeat(50);
    let light = "-".repeat(50);

    let mut body = String::new();
    body.push_str("Resource Guardian Alert\n");
    body.push_str(&format!("{}\n\n", heavy));
    body.push_str(&format!("Server: {}\n", server_name));
    body.push_str(&format!("Time: {}\n\n", local_datetime(alert.timestamp)));
    body.push_str("Alert Details:\n");
    body.push_str(&format!("{}\n", light));
    body.push_str(&format!("Type: {}\n", capitalize(alert.metric_type.as_str())));
    body.push_str(&format!("Severity: {}\n", capitalize(alert.severity.as_str())));
    body.push_str(&format!("Message: {}\n\n", alert.message));
    body.push_str(&format!("Current Value: {:.2}%\n", alert.metric_value));
    body.push_str(&format!("Threshold: {:.2}%\n\n", alert.threshold_value));
    body.push_str(&format!("{}\n\n", heavy));
    body.push_str("Recommended Actions:\n");
    body.push_str(recommendations(&alert.metric_type, alert.severity));
    body.push_str("\n\n");
    body.push_str("This is an automated alert from Resource Guardian.\n");
    body.push_str("Please do not reply to this email.\n");
    body
}

/// Canned remediation advice per (type, severity)
pub fn recommendations(metric_type: &MetricType, severity: Severity) -> &'static str {
    let kind = match metric_type {
        MetricType::DatabaseConnections => "mysql",
        other => other.as_str(),
    };

    match (kind, severity) {
        ("cpu", Severity::Warning) => {
            "1. Check running processes with 'top' or 'htop'\n\
             2. Identify resource-intensive applications\n\
             3. Consider optimizing code or queries\n\
             4. Monitor for unusual activity"
        }
        ("cpu", Severity::Critical) => {
            "IMMEDIATE ACTION REQUIRED:\n\
             1. SSH into server and run 'top' to identify processes\n\
             2. Consider killing non-essential processes\n\
             3. Restart services if necessary (php-fpm, apache, nginx)\n\
             4. Check for malware or unauthorized access\n\
             5. Consider upgrading server resources"
        }
        ("ram", Severity::Warning) => {
            "1. Check memory usage with 'free -h'\n\
             2. Review application memory leaks\n\
             3. Clear caches (WordPress, Opcache, etc.)\n\
             4. Restart PHP-FPM if needed"
        }
        ("ram", Severity::Critical) => {
            "IMMEDIATE ACTION REQUIRED:\n\
             1. Restart PHP-FPM: systemctl restart php-fpm\n\
             2. Clear all caches\n\
             3. Check for memory leaks in applications\n\
             4. Consider adding swap space temporarily\n\
             5. Plan server RAM upgrade"
        }
        ("io", Severity::Warning) => {
            "1. Check disk I/O with 'iostat'\n\
             2. Review database queries\n\
             3. Optimize file operations\n\
             4. Consider SSD upgrade"
        }
        ("io", Severity::Critical) => {
            "IMMEDIATE ACTION REQUIRED:\n\
             1. Identify I/O intensive processes\n\
             2. Stop non-essential disk operations\n\
             3. Check disk health\n\
             4. Consider moving to faster storage"
        }
        ("mysql", Severity::Warning) => {
            "1. Check slow query log\n\
             2. Optimize database tables\n\
             3. Review connection pool settings\n\
             4. Add indexes where needed"
        }
        ("mysql", Severity::Critical) => {
            "IMMEDIATE ACTION REQUIRED:\n\
             1. Kill long-running queries\n\
             2. Restart MySQL if unresponsive\n\
             3. Check for table locks\n\
             4. Review and optimize slow queries"
        }
        _ => FALLBACK_ADVICE,
    }
}
