//! Alerting configuration and channel test commands

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{ActionResponse, ApiClient, TestEmailRequest, TestWebhookRequest};
use crate::output::{print_json, print_rows, print_success, print_warning, OutputFormat};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Parse `KEY=VALUE` arguments
pub fn parse_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut values = BTreeMap::new();
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => bail!("Expected KEY=VALUE, got '{}'", pair),
        }
    }
    Ok(values)
}

pub async fn show_config(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let settings: BTreeMap<String, String> = client.get("api/v1/config").await?;

    match format {
        OutputFormat::Json => print_json(&settings)?,
        OutputFormat::Table => {
            if settings.is_empty() {
                print_warning("No configuration stored, defaults apply");
                return Ok(());
            }

            print_rows(
                settings
                    .into_iter()
                    .map(|(key, value)| SettingRow { key, value })
                    .collect(),
            );
        }
    }

    Ok(())
}

pub async fn set_config(client: &ApiClient, pairs: &[String], format: OutputFormat) -> Result<()> {
    let values = parse_pairs(pairs)?;
    let response: ActionResponse = client.put("api/v1/config", &values).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&format!(
                "{} ({} keys)",
                response.message,
                response.saved.unwrap_or(0)
            ));
            Ok(())
        }
    }
}

pub async fn test_email(client: &ApiClient, address: &str, format: OutputFormat) -> Result<()> {
    let request = TestEmailRequest {
        address: address.to_string(),
    };
    let response: ActionResponse = client.post("api/v1/test/email", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&response.message);
            Ok(())
        }
    }
}

pub async fn test_webhook(client: &ApiClient, url: &str, format: OutputFormat) -> Result<()> {
    let request = TestWebhookRequest {
        url: url.to_string(),
    };
    let response: ActionResponse = client.post("api/v1/test/webhook", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            let platform = response.platform.as_deref().unwrap_or("generic");
            print_success(&format!("{} ({})", response.message, platform));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = vec![
            "cpu_warning_threshold=60".to_string(),
            "webhook_url=https://hooks.slack.com/services/T/B/X?a=b".to_string(),
        ];
        let values = parse_pairs(&pairs).unwrap();
        assert_eq!(values["cpu_warning_threshold"], "60");
        assert_eq!(values["webhook_url"], "https://hooks.slack.com/services/T/B/X?a=b");
    }

    #[test]
    fn test_parse_pairs_rejects_malformed() {
        assert!(parse_pairs(&["cpu_warning_threshold".to_string()]).is_err());
        assert!(parse_pairs(&["=60".to_string()]).is_err());
    }
}
