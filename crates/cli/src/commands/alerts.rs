//! Alert log commands

use anyhow::Result;
use tabled::Tabled;
use url::form_urlencoded;

use crate::client::{ActionResponse, Alert, AlertStat, ApiClient};
use crate::output::{
    color_severity, color_status, format_percent, format_timestamp, print_json, print_rows,
    print_success, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "State")]
    state: String,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Count")]
    count: u64,
}

/// Build the alert listing query string
pub fn alerts_path(limit: i64, alert_type: Option<&str>, severity: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("limit", &limit.to_string());
    if let Some(t) = alert_type {
        query.append_pair("type", t);
    }
    if let Some(s) = severity {
        query.append_pair("severity", s);
    }
    format!("api/v1/alerts?{}", query.finish())
}

pub async fn list_alerts(
    client: &ApiClient,
    limit: i64,
    alert_type: Option<String>,
    severity: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let path = alerts_path(limit, alert_type.as_deref(), severity.as_deref());
    let alerts: Vec<Alert> = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&alerts)?,
        OutputFormat::Table => {
            if alerts.is_empty() {
                print_warning("No alerts found");
                return Ok(());
            }

            let rows: Vec<AlertRow> = alerts
                .iter()
                .map(|a| AlertRow {
                    id: a.id.map(|id| id.to_string()).unwrap_or_default(),
                    time: format_timestamp(a.timestamp),
                    alert_type: a.alert_type.clone(),
                    severity: color_severity(&a.severity),
                    value: format_percent(a.metric_value),
                    threshold: format_percent(a.threshold_value),
                    state: color_status(if a.resolved { "resolved" } else { "open" }),
                })
                .collect();

            print_rows(rows);
            println!("\nTotal: {} alerts", alerts.len());
        }
    }

    Ok(())
}

pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: Vec<AlertStat> = client.get("api/v1/alerts/stats").await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            if stats.is_empty() {
                print_warning("No alerts recorded");
                return Ok(());
            }

            print_rows(
                stats
                    .iter()
                    .map(|s| StatRow {
                        alert_type: s.alert_type.clone(),
                        severity: color_severity(&s.severity),
                        count: s.count,
                    })
                    .collect(),
            );
        }
    }

    Ok(())
}

pub async fn resolve_alert(client: &ApiClient, id: i64, format: OutputFormat) -> Result<()> {
    let response: ActionResponse = client
        .post(&format!("api/v1/alerts/{}/resolve", id), &serde_json::json!({}))
        .await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&response.message);
            Ok(())
        }
    }
}

pub async fn clear_alerts(client: &ApiClient, yes: bool, format: OutputFormat) -> Result<()> {
    if !yes {
        print_warning("This deletes every alert. Re-run with --yes to confirm.");
        return Ok(());
    }

    let response: ActionResponse = client
        .post("api/v1/alerts/clear", &serde_json::json!({}))
        .await?;

    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            print_success(&format!(
                "{} ({} removed)",
                response.message,
                response.removed.unwrap_or(0)
            ));
            Ok(())
        }
    }
}
