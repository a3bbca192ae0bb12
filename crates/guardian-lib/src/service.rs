//! Query and command operations exposed to dashboards and the CLI
//!
//! Every call goes straight to the store or notifier; there is no caching
//! and no queueing. Time windows and result sizes are clamped here so every
//! transport gets the same bounds.

use crate::models::{AlertEvent, AlertFilter, AlertStat, AverageMetrics, MetricSample};
use crate::notifier::{NotifyError, Notifier, Platform};
use crate::settings::Settings;
use crate::store::{MetricsStore, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub const MIN_HOURS: i64 = 1;
pub const MAX_HOURS: i64 = 720;
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub fn clamp_hours(hours: i64) -> i64 {
    hours.clamp(MIN_HOURS, MAX_HOURS)
}

pub fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Facade over the store and notifier
#[derive(Clone)]
pub struct GuardianService {
    store: MetricsStore,
    notifier: Arc<Notifier>,
}

impl GuardianService {
    pub fn new(store: MetricsStore, notifier: Arc<Notifier>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Most recent sample; `None` means nothing recorded yet
    pub async fn latest_sample(&self) -> Result<Option<MetricSample>, ServiceError> {
        Ok(self.store.latest().await?)
    }

    /// Samples from the last `hours` hours (clamped to 1..=720)
    pub async fn sample_range(&self, hours: i64) -> Result<Vec<MetricSample>, ServiceError> {
        Ok(self.store.range(window_start(hours)).await?)
    }

    pub async fn average_metrics(&self, hours: i64) -> Result<AverageMetrics, ServiceError> {
        Ok(self.store.average(window_start(hours)).await?)
    }

    /// Newest alerts first; `limit` is clamped to 1..=500
    pub async fn recent_alerts(
        &self,
        filter: AlertFilter,
    ) -> Result<Vec<AlertEvent>, ServiceError> {
        let filter = AlertFilter {
            limit: clamp_limit(filter.limit),
            ..filter
        };
        Ok(self.store.recent_alerts(&filter).await?)
    }

    pub async fn alert_stats(&self) -> Result<Vec<AlertStat>, ServiceError> {
        Ok(self.store.alert_stats().await?)
    }

    pub async fn resolve_alert(&self, id: i64) -> Result<(), ServiceError> {
        if id <= 0 {
            return Err(ServiceError::InvalidArgument("Invalid alert ID".to_string()));
        }

        let resolved_at = chrono::Utc::now().timestamp();
        if !self.store.resolve_alert(id, resolved_at).await? {
            return Err(ServiceError::NotFound(format!("Alert {} not found", id)));
        }

        info!(alert_id = id, "Alert resolved");
        Ok(())
    }

    /// Delete every alert, returning how many were removed
    pub async fn clear_all_alerts(&self) -> Result<u64, ServiceError> {
        let removed = self.store.clear_alerts().await?;
        info!(removed = removed, "Alert log cleared");
        Ok(removed)
    }

    pub async fn settings(&self) -> Result<Settings, ServiceError> {
        Ok(self.store.load_settings().await?)
    }

    /// Upsert configuration keys, returning how many were written
    pub async fn save_config(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<usize, ServiceError> {
        let written = self.store.save_settings(values).await?;
        info!(keys = written, "Configuration saved");
        Ok(written)
    }

    pub async fn test_email(&self, address: &str) -> Result<(), ServiceError> {
        Ok(self.notifier.test_email(address).await?)
    }

    pub async fn test_webhook(&self, url: &str) -> Result<Platform, ServiceError> {
        Ok(self.notifier.test_webhook(url).await?)
    }
}

fn window_start(hours: i64) -> i64 {
    chrono::Utc::now().timestamp() - clamp_hours(hours) * 3600
}
