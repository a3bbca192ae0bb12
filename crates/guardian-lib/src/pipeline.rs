//! One monitoring tick: sample, persist, evaluate, notify, prune
//!
//! The tick is strictly sequential. A storage failure aborts it and is
//! returned to the caller; sampling and notification problems are logged
//! and never fail the tick. Alerts are persisted before any delivery is
//! attempted, and retention pruning runs last on a best-effort basis.

use crate::evaluator::{AlertHistory, ThresholdEvaluator};
use crate::health::{components, HealthRegistry};
use crate::models::{AlertEvent, MetricSample};
use crate::notifier::{DispatchReport, Notifier};
use crate::observability::{GuardianMetrics, StructuredLogger};
use crate::sampler::MetricsSource;
use crate::store::{MetricsStore, StoreError};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Default retention for samples and alerts
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

const SECONDS_PER_DAY: i64 = 86_400;

/// What a completed tick did
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub sample: MetricSample,
    /// Alerts raised this tick, with store ids assigned
    pub alerts: Vec<AlertEvent>,
    /// One dispatch report per raised alert, same order
    pub dispatches: Vec<DispatchReport>,
    pub suppressed: usize,
    pub pruned: u64,
    /// Interval the settings ask for before the next tick
    pub next_interval_secs: u64,
}

impl TickReport {
    pub fn next_interval(&self) -> Duration {
        Duration::from_secs(self.next_interval_secs)
    }

    /// True when every attempted notification was delivered
    pub fn notifications_ok(&self) -> bool {
        self.dispatches.iter().all(DispatchReport::success)
    }
}

/// The sample, evaluate and notify pipeline
pub struct Pipeline {
    source: Arc<dyn MetricsSource>,
    store: MetricsStore,
    notifier: Arc<Notifier>,
    evaluator: ThresholdEvaluator,
    retention_days: u32,
    health: Option<HealthRegistry>,
    metrics: GuardianMetrics,
    logger: StructuredLogger,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    /// Run one full tick
    pub async fn run_tick(&self) -> Result<TickReport, StoreError> {
        let started = Instant::now();
        let result = self.tick().await;
        let elapsed = started.elapsed();

        self.metrics.observe_tick(elapsed.as_secs_f64());

        match &result {
            Ok(report) => {
                self.logger.log_tick_complete(
                    report.alerts.len(),
                    report.suppressed,
                    report.pruned,
                    elapsed.as_millis(),
                );
                if let Some(health) = &self.health {
                    health.set_healthy(components::STORE).await;
                    if report.notifications_ok() {
                        health.set_healthy(components::NOTIFIER).await;
                    } else {
                        health
                            .set_degraded(components::NOTIFIER, "Last tick had failed deliveries")
                            .await;
                    }
                    health.record_tick(report.sample.timestamp).await;
                }
            }
            Err(e) => {
                self.metrics.inc_ticks_failed();
                if let Some(health) = &self.health {
                    health.set_unhealthy(components::STORE, e.to_string()).await;
                }
            }
        }

        result
    }

    async fn tick(&self) -> Result<TickReport, StoreError> {
        let sample = self.source.collect().await;

        self.store
            .record(&sample)
            .await
            .map_err(|e| self.storage_failure("record_sample", e))?;
        self.metrics.record_sample(&sample);
        self.logger.log_sample(&sample);

        let settings = self
            .store
            .load_settings()
            .await
            .map_err(|e| self.storage_failure("load_settings", e))?;

        let since = sample.timestamp - settings.alert_cooldown_secs();
        let recent = self
            .store
            .alert_history(since)
            .await
            .map_err(|e| self.storage_failure("alert_history", e))?;
        let history = AlertHistory::from_alerts(&recent);

        let evaluation = self.evaluator.evaluate(&sample, &settings, &history);
        for suppressed in &evaluation.suppressed {
            self.metrics.inc_alert_suppressed(suppressed);
        }

        let mut alerts = Vec::with_capacity(evaluation.alerts.len());
        let mut dispatches = Vec::with_capacity(evaluation.alerts.len());

        for mut alert in evaluation.alerts {
            let id = self
                .store
                .record_alert(&alert)
                .await
                .map_err(|e| self.storage_failure("record_alert", e))?;
            alert.id = Some(id);

            self.metrics.inc_alert_raised(&alert);
            self.logger.log_alert(&alert);

            let report = self.notifier.dispatch(&alert, &settings).await;
            for outcome in &report.outcomes {
                self.logger.log_delivery(&alert, outcome);
                if !outcome.delivered {
                    self.metrics.inc_notification_failure(outcome.channel.as_str());
                }
            }

            alerts.push(alert);
            dispatches.push(report);
        }

        let pruned = self.prune(sample.timestamp).await;

        Ok(TickReport {
            sample,
            alerts,
            dispatches,
            suppressed: evaluation.suppressed.len(),
            pruned,
            next_interval_secs: settings.monitoring_interval_secs(),
        })
    }

    /// Retention pass; failures are logged and reported as zero rows
    async fn prune(&self, now: i64) -> u64 {
        if self.retention_days == 0 {
            return 0;
        }

        let cutoff = now - i64::from(self.retention_days) * SECONDS_PER_DAY;
        match self.store.prune_older_than(cutoff).await {
            Ok(counts) => {
                self.metrics.add_rows_pruned(counts.total());
                counts.total()
            }
            Err(e) => {
                self.metrics.inc_storage_errors();
                warn!(error = %e, cutoff = cutoff, "Retention prune failed");
                0
            }
        }
    }

    fn storage_failure(&self, stage: &str, error: StoreError) -> StoreError {
        self.metrics.inc_storage_errors();
        self.logger.log_tick_failed(stage, &error);
        error
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    source: Option<Arc<dyn MetricsSource>>,
    store: Option<MetricsStore>,
    notifier: Option<Arc<Notifier>>,
    retention_days: u32,
    health: Option<HealthRegistry>,
    server_name: Option<String>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            notifier: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            health: None,
            server_name: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: MetricsStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Days of history to keep; 0 disables pruning
    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Server name used in log events; defaults to the notifier's
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metrics source is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Metrics store is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("Notifier is required"))?;

        let server_name = self
            .server_name
            .unwrap_or_else(|| notifier.server_name().to_string());

        Ok(Pipeline {
            source,
            store,
            notifier,
            evaluator: ThresholdEvaluator::new(),
            retention_days: self.retention_days,
            health: self.health,
            metrics: GuardianMetrics::new(),
            logger: StructuredLogger::new(server_name),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
