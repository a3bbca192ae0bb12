//! Threshold evaluation with cooldown deduplication
//!
//! Each metric is classified independently against its warning/critical
//! bounds. Critical is checked first, so a sample produces at most one
//! candidate per metric. A candidate is dropped when an alert of the same
//! (type, severity) was created within the configured cooldown.
//!
//! Nothing enforces `critical > warning`: with inverted bounds every
//! qualifying sample is reported as critical.

use crate::models::{AlertEvent, MetricSample, MetricType, Severity};
use crate::settings::{Settings, Thresholds};
use std::collections::HashMap;
use tracing::debug;

/// Creation times of recent alerts, keyed by (type, severity)
#[derive(Debug, Clone, Default)]
pub struct AlertHistory {
    last_created: HashMap<(MetricType, Severity), i64>,
}

impl AlertHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored alerts; resolution state is ignored
    pub fn from_alerts(alerts: &[AlertEvent]) -> Self {
        let mut history = Self::new();
        for alert in alerts {
            history.record(alert);
        }
        history
    }

    pub fn record(&mut self, alert: &AlertEvent) {
        self.last_created
            .entry((alert.metric_type.clone(), alert.severity))
            .and_modify(|ts| *ts = (*ts).max(alert.timestamp))
            .or_insert(alert.timestamp);
    }

    pub fn last_created(&self, metric_type: &MetricType, severity: Severity) -> Option<i64> {
        self.last_created
            .get(&(metric_type.clone(), severity))
            .copied()
    }

    /// True when a matching alert was created after `now - cooldown_secs`
    pub fn in_cooldown(
        &self,
        metric_type: &MetricType,
        severity: Severity,
        now: i64,
        cooldown_secs: i64,
    ) -> bool {
        self.last_created(metric_type, severity)
            .map(|last| last > now - cooldown_secs)
            .unwrap_or(false)
    }
}

/// A candidate alert dropped by the cooldown check
#[derive(Debug, Clone, PartialEq)]
pub struct Suppressed {
    pub metric_type: MetricType,
    pub severity: Severity,
    pub metric_value: f64,
}

/// Outcome of evaluating one sample
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub alerts: Vec<AlertEvent>,
    pub suppressed: Vec<Suppressed>,
}

impl Evaluation {
    pub fn into_alerts(self) -> Vec<AlertEvent> {
        self.alerts
    }
}

struct Rule {
    metric_type: MetricType,
    value: f64,
    thresholds: Thresholds,
}

/// Stateless rule evaluator; all inputs are passed per call
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEvaluator;

impl ThresholdEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        sample: &MetricSample,
        settings: &Settings,
        history: &AlertHistory,
    ) -> Evaluation {
        let cooldown = settings.alert_cooldown_secs();
        let mut evaluation = Evaluation::default();

        for rule in Self::rules(sample, settings) {
            let Some((severity, threshold)) = classify(rule.value, &rule.thresholds) else {
                continue;
            };

            if history.in_cooldown(&rule.metric_type, severity, sample.timestamp, cooldown) {
                debug!(
                    metric_type = %rule.metric_type,
                    severity = %severity,
                    value = rule.value,
                    cooldown_secs = cooldown,
                    "Alert suppressed by cooldown"
                );
                evaluation.suppressed.push(Suppressed {
                    metric_type: rule.metric_type,
                    severity,
                    metric_value: rule.value,
                });
                continue;
            }

            evaluation.alerts.push(AlertEvent::new(
                sample.timestamp,
                rule.metric_type,
                severity,
                rule.value,
                threshold,
            ));
        }

        evaluation
    }

    fn rules(sample: &MetricSample, settings: &Settings) -> Vec<Rule> {
        let mut rules = vec![
            Rule {
                metric_type: MetricType::Cpu,
                value: sample.cpu_usage,
                thresholds: settings.cpu_thresholds(),
            },
            Rule {
                metric_type: MetricType::Ram,
                value: sample.ram_usage,
                thresholds: settings.ram_thresholds(),
            },
        ];

        // A zero I/O total means rates were not sampled, not an idle disk
        if let Some(thresholds) = settings.io_thresholds() {
            if sample.io_total() > 0.0 {
                rules.push(Rule {
                    metric_type: MetricType::Io,
                    value: sample.io_total(),
                    thresholds,
                });
            }
        }

        rules
    }
}

/// Pick the crossed tier and its bound. Critical wins.
fn classify(value: f64, thresholds: &Thresholds) -> Option<(Severity, f64)> {
    if let Some(critical) = thresholds.critical {
        if value >= critical {
            return Some((Severity::Critical, critical));
        }
    }

    if value >= thresholds.warning {
        return Some((Severity::Warning, thresholds.warning));
    }

    None
}
