//! Alerting configuration snapshot
//!
//! Settings are a free-form string key-value map persisted in the store.
//! A snapshot is read once per tick and handed explicitly to the evaluator
//! and the notifier. Typed accessors fall back to documented defaults when a
//! key is missing or malformed; unknown keys are kept but ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Recognized configuration keys
pub mod keys {
    pub const CPU_WARNING: &str = "cpu_warning_threshold";
    pub const CPU_CRITICAL: &str = "cpu_critical_threshold";
    pub const RAM_WARNING: &str = "ram_warning_threshold";
    pub const RAM_CRITICAL: &str = "ram_critical_threshold";
    pub const IO_WARNING: &str = "io_warning_threshold";
    pub const MONITORING_INTERVAL: &str = "monitoring_interval";
    pub const ALERT_COOLDOWN: &str = "alert_cooldown";
    pub const ENABLE_EMAIL: &str = "enable_email_alerts";
    pub const ALERT_EMAIL: &str = "alert_email";
    pub const ENABLE_WEBHOOK: &str = "enable_webhook_alerts";
    pub const WEBHOOK_URL: &str = "webhook_url";
}

pub const DEFAULT_CPU_WARNING: f64 = 70.0;
pub const DEFAULT_CPU_CRITICAL: f64 = 85.0;
pub const DEFAULT_RAM_WARNING: f64 = 75.0;
pub const DEFAULT_RAM_CRITICAL: f64 = 90.0;
pub const DEFAULT_IO_WARNING: f64 = 80.0;
pub const DEFAULT_ALERT_COOLDOWN_SECS: i64 = 300;
pub const ALERT_COOLDOWN_RANGE: (i64, i64) = (60, 3600);
pub const DEFAULT_MONITORING_INTERVAL_SECS: u64 = 60;
pub const MONITORING_INTERVAL_RANGE: (u64, u64) = (30, 300);

/// Warning/critical bounds for one metric. `critical` is `None` for
/// metrics without a critical tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: Option<f64>,
}

/// Immutable view of the key-value configuration table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Builder-style setter, mostly useful in tests
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn cpu_thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.number(keys::CPU_WARNING, DEFAULT_CPU_WARNING),
            critical: Some(self.number(keys::CPU_CRITICAL, DEFAULT_CPU_CRITICAL)),
        }
    }

    pub fn ram_thresholds(&self) -> Thresholds {
        Thresholds {
            warning: self.number(keys::RAM_WARNING, DEFAULT_RAM_WARNING),
            critical: Some(self.number(keys::RAM_CRITICAL, DEFAULT_RAM_CRITICAL)),
        }
    }

    /// I/O thresholds, only when `io_warning_threshold` is explicitly set
    pub fn io_thresholds(&self) -> Option<Thresholds> {
        if !self.contains(keys::IO_WARNING) {
            return None;
        }

        Some(Thresholds {
            warning: self.number(keys::IO_WARNING, DEFAULT_IO_WARNING),
            critical: None,
        })
    }

    /// Deduplication window in seconds, clamped to 60..=3600
    pub fn alert_cooldown_secs(&self) -> i64 {
        let (min, max) = ALERT_COOLDOWN_RANGE;
        let raw = self.number(keys::ALERT_COOLDOWN, DEFAULT_ALERT_COOLDOWN_SECS as f64) as i64;
        raw.clamp(min, max)
    }

    /// Seconds between ticks, clamped to 30..=300
    pub fn monitoring_interval_secs(&self) -> u64 {
        let (min, max) = MONITORING_INTERVAL_RANGE;
        let raw = self.number(
            keys::MONITORING_INTERVAL,
            DEFAULT_MONITORING_INTERVAL_SECS as f64,
        );
        (raw.max(0.0) as u64).clamp(min, max)
    }

    pub fn email_enabled(&self) -> bool {
        self.flag(keys::ENABLE_EMAIL)
    }

    /// Configured email destination, if non-empty
    pub fn alert_email(&self) -> Option<&str> {
        self.non_empty(keys::ALERT_EMAIL)
    }

    pub fn webhook_enabled(&self) -> bool {
        self.flag(keys::ENABLE_WEBHOOK)
    }

    /// Configured webhook destination, if non-empty
    pub fn webhook_url(&self) -> Option<&str> {
        self.non_empty(keys::WEBHOOK_URL)
    }

    fn number(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            None => default,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    warn!(
                        key = %key,
                        value = %raw,
                        default = default,
                        "Malformed numeric setting, using default"
                    );
                    default
                }
            },
        }
    }

    fn flag(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref(),
            Some("1") | Some("true") | Some("yes") | Some("on")
        )
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let settings = Settings::new();

        assert_eq!(
            settings.cpu_thresholds(),
            Thresholds {
                warning: 70.0,
                critical: Some(85.0)
            }
        );
        assert_eq!(
            settings.ram_thresholds(),
            Thresholds {
                warning: 75.0,
                critical: Some(90.0)
            }
        );
        assert_eq!(settings.io_thresholds(), None);
        assert_eq!(settings.alert_cooldown_secs(), 300);
        assert_eq!(settings.monitoring_interval_secs(), 60);
        assert!(!settings.email_enabled());
        assert!(!settings.webhook_enabled());
    }

    #[test]
    fn test_malformed_threshold_falls_back() {
        let settings = Settings::new()
            .with(keys::CPU_WARNING, "seventy")
            .with(keys::CPU_CRITICAL, " 92 ");

        let thresholds = settings.cpu_thresholds();
        assert_eq!(thresholds.warning, 70.0);
        assert_eq!(thresholds.critical, Some(92.0));
    }

    #[test]
    fn test_io_thresholds_only_when_configured() {
        let settings = Settings::new().with(keys::IO_WARNING, "55");
        assert_eq!(
            settings.io_thresholds(),
            Some(Thresholds {
                warning: 55.0,
                critical: None
            })
        );
    }

    #[test]
    fn test_ranges_are_clamped() {
        let settings = Settings::new()
            .with(keys::ALERT_COOLDOWN, "5")
            .with(keys::MONITORING_INTERVAL, "9999");
        assert_eq!(settings.alert_cooldown_secs(), 60);
        assert_eq!(settings.monitoring_interval_secs(), 300);
    }

    #[test]
    fn test_flags_and_destinations() {
        let settings = Settings::new()
            .with(keys::ENABLE_EMAIL, "1")
            .with(keys::ALERT_EMAIL, "  ")
            .with(keys::ENABLE_WEBHOOK, "true")
            .with(keys::WEBHOOK_URL, "https://example.com/hook");

        assert!(settings.email_enabled());
        assert_eq!(settings.alert_email(), None);
        assert!(settings.webhook_enabled());
        assert_eq!(settings.webhook_url(), Some("https://example.com/hook"));

        let disabled = Settings::new().with(keys::ENABLE_EMAIL, "0");
        assert!(!disabled.email_enabled());
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let settings = Settings::new().with("dashboard_theme", "dark");
        assert_eq!(settings.get("dashboard_theme"), Some("dark"));
        assert_eq!(settings.cpu_thresholds().warning, 70.0);
    }
}
