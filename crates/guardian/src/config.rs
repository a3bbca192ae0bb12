//! Process configuration
//!
//! Alerting thresholds and channel toggles live in the store's `config`
//! table; this only covers what the process needs before it can open it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Guardian process configuration, read from `GUARDIAN_*` variables
#[derive(Debug, Clone, Deserialize)]
pub struct GuardianConfig {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name reported in notifications
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Dashboard API port for `serve` mode
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Samples and alerts older than this are pruned each tick; 0 keeps everything
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,

    /// MySQL/MariaDB URL for connection stats; an empty value disables them
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_database_timeout")]
    pub database_timeout_secs: u64,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Overrides the `Resource Guardian <noreply@{server}>` sender
    #[serde(default)]
    pub smtp_sender: Option<String>,

    #[serde(default = "default_delivery_timeout")]
    pub smtp_timeout_secs: u64,

    #[serde(default = "default_delivery_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/resource-guardian/metrics.db")
}

fn default_server_name() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_retention_days() -> u32 {
    30
}

fn default_busy_timeout() -> u64 {
    5
}

/// Local engine with the stock administrative account
fn default_database_url() -> String {
    "mysql://root@localhost/information_schema".to_string()
}

fn default_database_timeout() -> u64 {
    3
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_delivery_timeout() -> u64 {
    10
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            server_name: default_server_name(),
            api_port: default_api_port(),
            retention_days: default_retention_days(),
            busy_timeout_secs: default_busy_timeout(),
            database_url: default_database_url(),
            database_timeout_secs: default_database_timeout(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_sender: None,
            smtp_timeout_secs: default_delivery_timeout(),
            webhook_timeout_secs: default_delivery_timeout(),
        }
    }
}

impl GuardianConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("GUARDIAN"))
            .build()?;

        Self::from_config(config)
    }

    /// Malformed values are an error; only missing keys take defaults
    pub fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid GUARDIAN_* configuration")
    }

    /// Database URL, `None` when database stats are switched off
    pub fn active_database_url(&self) -> Option<&str> {
        let url = self.database_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    pub fn database_timeout(&self) -> Duration {
        Duration::from_secs(self.database_timeout_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}
