//! Observability for the guardian
//!
//! Provides:
//! - Prometheus metrics (tick latency, alerts raised/suppressed, delivery failures)
//! - Structured JSON log events for ticks, alerts and notifications

use crate::evaluator::Suppressed;
use crate::models::{AlertEvent, MetricSample};
use crate::notifier::ChannelOutcome;
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, Histogram, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Tick latency buckets in seconds; a tick includes network delivery
const TICK_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<GuardianMetricsInner> = OnceLock::new();

struct GuardianMetricsInner {
    tick_duration_seconds: Histogram,
    ticks_failed: IntCounter,
    samples_recorded: IntCounter,
    alerts_raised: IntCounterVec,
    alerts_suppressed: IntCounterVec,
    notification_failures: IntCounterVec,
    storage_errors: IntCounter,
    rows_pruned: IntCounter,
    cpu_usage_percent: Gauge,
    ram_usage_percent: Gauge,
    database_connections: IntGauge,
}

impl GuardianMetricsInner {
    fn new() -> Self {
        Self {
            tick_duration_seconds: register_histogram!(
                "resource_guardian_tick_duration_seconds",
                "Time spent on one sample/evaluate/notify tick",
                TICK_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_duration_seconds"),

            ticks_failed: register_int_counter!(
                "resource_guardian_ticks_failed_total",
                "Ticks aborted by a storage failure"
            )
            .expect("Failed to register ticks_failed"),

            samples_recorded: register_int_counter!(
                "resource_guardian_samples_recorded_total",
                "Metric samples persisted"
            )
            .expect("Failed to register samples_recorded"),

            alerts_raised: register_int_counter_vec!(
                "resource_guardian_alerts_raised_total",
                "Alerts raised by threshold evaluation",
                &["alert_type", "severity"]
            )
            .expect("Failed to register alerts_raised"),

            alerts_suppressed: register_int_counter_vec!(
                "resource_guardian_alerts_suppressed_total",
                "Alerts dropped by the cooldown window",
                &["alert_type", "severity"]
            )
            .expect("Failed to register alerts_suppressed"),

            notification_failures: register_int_counter_vec!(
                "resource_guardian_notification_failures_total",
                "Failed notification deliveries",
                &["channel"]
            )
            .expect("Failed to register notification_failures"),

            storage_errors: register_int_counter!(
                "resource_guardian_storage_errors_total",
                "Metrics store operations that failed"
            )
            .expect("Failed to register storage_errors"),

            rows_pruned: register_int_counter!(
                "resource_guardian_rows_pruned_total",
                "Samples and alerts removed by retention"
            )
            .expect("Failed to register rows_pruned"),

            cpu_usage_percent: register_gauge!(
                "resource_guardian_cpu_usage_percent",
                "CPU usage from the latest sample"
            )
            .expect("Failed to register cpu_usage_percent"),

            ram_usage_percent: register_gauge!(
                "resource_guardian_ram_usage_percent",
                "RAM usage from the latest sample"
            )
            .expect("Failed to register ram_usage_percent"),

            database_connections: register_int_gauge!(
                "resource_guardian_database_connections",
                "Database connections from the latest sample"
            )
            .expect("Failed to register database_connections"),
        }
    }
}

/// Handle to the process-wide guardian metrics. Clones share state.
#[derive(Clone)]
pub struct GuardianMetrics {
    inner: &'static GuardianMetricsInner,
}

impl Default for GuardianMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardianMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(GuardianMetricsInner::new),
        }
    }

    pub fn observe_tick(&self, duration_secs: f64) {
        self.inner.tick_duration_seconds.observe(duration_secs);
    }

    pub fn inc_ticks_failed(&self) {
        self.inner.ticks_failed.inc();
    }

    /// Count a persisted sample and publish its headline values
    pub fn record_sample(&self, sample: &MetricSample) {
        self.inner.samples_recorded.inc();
        self.inner.cpu_usage_percent.set(sample.cpu_usage);
        self.inner.ram_usage_percent.set(sample.ram_usage);
        self.inner
            .database_connections
            .set(i64::try_from(sample.database_connections).unwrap_or(i64::MAX));
    }

    pub fn inc_alert_raised(&self, alert: &AlertEvent) {
        self.inner
            .alerts_raised
            .with_label_values(&[alert.metric_type.as_str(), alert.severity.as_str()])
            .inc();
    }

    pub fn inc_alert_suppressed(&self, suppressed: &Suppressed) {
        self.inner
            .alerts_suppressed
            .with_label_values(&[suppressed.metric_type.as_str(), suppressed.severity.as_str()])
            .inc();
    }

    pub fn inc_notification_failure(&self, channel: &str) {
        self.inner
            .notification_failures
            .with_label_values(&[channel])
            .inc();
    }

    pub fn inc_storage_errors(&self) {
        self.inner.storage_errors.inc();
    }

    pub fn add_rows_pruned(&self, rows: u64) {
        self.inner.rows_pruned.inc_by(rows);
    }
}

/// Render every registered metric in the Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Structured logger for guardian events
///
/// Every event carries `event` and `server` fields so log pipelines can
/// filter on them without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    server_name: String,
}

impl StructuredLogger {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, mode: &str) {
        info!(
            event = "guardian_started",
            server = %self.server_name,
            version = %version,
            mode = %mode,
            "Resource guardian started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "guardian_shutdown",
            server = %self.server_name,
            reason = %reason,
            "Resource guardian shutting down"
        );
    }

    pub fn log_sample(&self, sample: &MetricSample) {
        info!(
            event = "sample_recorded",
            server = %self.server_name,
            timestamp = sample.timestamp,
            cpu_usage = sample.cpu_usage,
            ram_usage = sample.ram_usage,
            ram_total_kb = sample.ram_total,
            ram_free_kb = sample.ram_free,
            database_connections = sample.database_connections,
            database_slow_queries = sample.database_slow_queries,
            "Metrics sample recorded"
        );
    }

    pub fn log_alert(&self, alert: &AlertEvent) {
        warn!(
            event = "alert_raised",
            server = %self.server_name,
            alert_id = ?alert.id,
            alert_type = %alert.metric_type,
            severity = %alert.severity,
            metric_value = alert.metric_value,
            threshold_value = alert.threshold_value,
            message = %alert.message,
            "Resource alert raised"
        );
    }

    pub fn log_delivery(&self, alert: &AlertEvent, outcome: &ChannelOutcome) {
        if outcome.delivered {
            info!(
                event = "notification_sent",
                server = %self.server_name,
                alert_id = ?alert.id,
                channel = %outcome.channel,
                "Alert notification delivered"
            );
        } else {
            warn!(
                event = "notification_failed",
                server = %self.server_name,
                alert_id = ?alert.id,
                channel = %outcome.channel,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Alert notification failed"
            );
        }
    }

    pub fn log_tick_complete(
        &self,
        alerts: usize,
        suppressed: usize,
        pruned: u64,
        elapsed_ms: u128,
    ) {
        info!(
            event = "tick_complete",
            server = %self.server_name,
            alerts = alerts,
            suppressed = suppressed,
            pruned = pruned,
            elapsed_ms = elapsed_ms as u64,
            "Monitoring tick complete"
        );
    }

    pub fn log_tick_failed(&self, stage: &str, error: &dyn std::error::Error) {
        error!(
            event = "tick_failed",
            server = %self.server_name,
            stage = %stage,
            error = %error,
            "Monitoring tick failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricType, Severity};

    #[test]
    fn test_metrics_render() {
        let metrics = GuardianMetrics::new();
        metrics.observe_tick(0.2);
        metrics.inc_alert_raised(&AlertEvent::new(
            1000,
            MetricType::Cpu,
            Severity::Critical,
            90.0,
            85.0,
        ));
        metrics.inc_notification_failure("webhook");
        metrics.add_rows_pruned(3);

        let text = render_metrics().unwrap();
        assert!(text.contains("resource_guardian_tick_duration_seconds"));
        assert!(text.contains("resource_guardian_alerts_raised_total"));
        assert!(text.contains("channel=\"webhook\""));
    }

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = GuardianMetrics::new();
        let b = a.clone();
        a.inc_storage_errors();
        b.inc_storage_errors();
        assert!(render_metrics()
            .unwrap()
            .contains("resource_guardian_storage_errors_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("web01");
        assert_eq!(logger.server_name, "web01");
    }
}
