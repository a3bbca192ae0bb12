//! Core data models for the resource guardian

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One normalized host snapshot, produced once per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Sampling instant, seconds since epoch
    pub timestamp: i64,
    /// CPU usage percentage (0-100, two decimals)
    pub cpu_usage: f64,
    /// RAM usage percentage (0-100, two decimals)
    pub ram_usage: f64,
    /// Total RAM in kilobytes
    pub ram_total: u64,
    /// Available (or free) RAM in kilobytes
    pub ram_free: u64,
    /// Disk read rate in MB/s
    pub io_read: f64,
    /// Disk write rate in MB/s
    pub io_write: f64,
    /// Open connections on the local database engine
    pub database_connections: u64,
    /// Cumulative slow query counter of the local database engine
    pub database_slow_queries: u64,
}

impl MetricSample {
    /// Combined I/O rate used by the I/O threshold rule
    pub fn io_total(&self) -> f64 {
        self.io_read + self.io_write
    }
}

/// Kind of metric an alert refers to.
///
/// The set is open: values that are not one of the known kinds round-trip
/// through [`MetricType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricType {
    Cpu,
    Ram,
    Io,
    DatabaseConnections,
    Other(String),
}

impl MetricType {
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Cpu => "cpu",
            MetricType::Ram => "ram",
            MetricType::Io => "io",
            MetricType::DatabaseConnections => "database-connections",
            MetricType::Other(name) => name,
        }
    }
}

impl From<String> for MetricType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "cpu" => MetricType::Cpu,
            "ram" => MetricType::Ram,
            "io" => MetricType::Io,
            "database-connections" => MetricType::DatabaseConnections,
            _ => MetricType::Other(value),
        }
    }
}

impl From<&str> for MetricType {
    fn from(value: &str) -> Self {
        MetricType::from(value.to_string())
    }
}

impl From<MetricType> for String {
    fn from(value: MetricType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Only used by test notifications
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// A raised alert, as stored in the alert log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Row id, assigned by the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub timestamp: i64,
    #[serde(rename = "alert_type")]
    pub metric_type: MetricType,
    pub severity: Severity,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<i64>,
}

impl AlertEvent {
    /// Create a new unresolved alert with the standard message format
    pub fn new(
        timestamp: i64,
        metric_type: MetricType,
        severity: Severity,
        metric_value: f64,
        threshold_value: f64,
    ) -> Self {
        let message = format!(
            "{} usage {}: {:.2}% (threshold: {}%)",
            capitalize(metric_type.as_str()),
            severity,
            metric_value,
            threshold_value
        );

        Self {
            id: None,
            timestamp,
            metric_type,
            severity,
            message,
            metric_value,
            threshold_value,
            resolved: false,
            resolved_at: None,
        }
    }

    /// Synthetic alert used to exercise notification channels
    pub fn test_alert(timestamp: i64) -> Self {
        Self {
            id: None,
            timestamp,
            metric_type: MetricType::Other("test".to_string()),
            severity: Severity::Info,
            message: "This is a test alert from Resource Guardian".to_string(),
            metric_value: 0.0,
            threshold_value: 0.0,
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Alert count for one (type, severity) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStat {
    pub alert_type: MetricType,
    pub severity: Severity,
    pub count: u64,
}

/// Optional filters for alert history queries
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub limit: i64,
    pub metric_type: Option<MetricType>,
    pub severity: Option<Severity>,
}

/// Aggregate CPU/RAM figures over a time window; `None` when no samples exist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub avg_cpu: Option<f64>,
    pub avg_ram: Option<f64>,
    pub max_cpu: Option<f64>,
    pub max_ram: Option<f64>,
    pub min_cpu: Option<f64>,
    pub min_ram: Option<f64>,
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Uppercase the first character of a word
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message_format() {
        let alert = AlertEvent::new(1000, MetricType::Cpu, Severity::Critical, 90.0, 85.0);
        assert_eq!(alert.message, "Cpu usage critical: 90.00% (threshold: 85%)");

        let alert = AlertEvent::new(1000, MetricType::Ram, Severity::Warning, 76.456, 75.5);
        assert_eq!(alert.message, "Ram usage warning: 76.46% (threshold: 75.5%)");
    }

    #[test]
    fn test_metric_type_open_set() {
        assert_eq!(MetricType::from("cpu"), MetricType::Cpu);
        assert_eq!(
            MetricType::from("database-connections"),
            MetricType::DatabaseConnections
        );
        assert_eq!(
            MetricType::from("swap"),
            MetricType::Other("swap".to_string())
        );
        assert_eq!(MetricType::Other("swap".to_string()).as_str(), "swap");
    }

    #[test]
    fn test_alert_serializes_with_alert_type_field() {
        let alert = AlertEvent::new(1000, MetricType::Ram, Severity::Warning, 80.0, 75.0);
        let json = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["alert_type"], "ram");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["resolved"], false);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(33.333333), 33.33);
        assert_eq!(round2(66.666666), 66.67);
        assert_eq!(round2(100.0), 100.0);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("cpu"), "Cpu");
        assert_eq!(capitalize(""), "");
    }
}
