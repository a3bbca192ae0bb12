//! In-process tick scheduler for long-running mode
//!
//! Ticks never overlap: the next sleep starts only after the previous tick
//! returns. The delay comes from the latest `monitoring_interval` setting,
//! so configuration changes apply without a restart. A failed tick keeps
//! the previous interval and is retried on schedule.

use crate::health::{components, HealthRegistry};
use crate::pipeline::Pipeline;
use crate::settings::DEFAULT_MONITORING_INTERVAL_SECS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Drives [`Pipeline::run_tick`] on the configured interval
pub struct TickLoop {
    pipeline: Arc<Pipeline>,
    health: Option<HealthRegistry>,
    interval: Duration,
    jitter: Duration,
}

impl TickLoop {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            health: None,
            interval: Duration::from_secs(DEFAULT_MONITORING_INTERVAL_SECS),
            jitter: Duration::from_secs(1),
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Upper bound of the random delay added to each sleep
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Run until `shutdown` fires, returning the number of ticks run.
    /// The first tick runs immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting monitoring loop"
        );

        let mut ticks = 0u64;
        loop {
            // A started tick always runs to completion
            self.tick_once().await;
            ticks += 1;

            let jitter = rand_jitter(self.jitter.as_millis() as u64);
            let delay = self.interval + Duration::from_millis(jitter);
            debug!(delay_ms = delay.as_millis() as u64, "Next tick scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!(ticks = ticks, "Shutting down monitoring loop");
                    break;
                }
            }
        }

        ticks
    }

    async fn tick_once(&mut self) {
        match self.pipeline.run_tick().await {
            Ok(report) => {
                if report.next_interval() != self.interval {
                    info!(
                        old_secs = self.interval.as_secs(),
                        new_secs = report.next_interval_secs,
                        "Monitoring interval changed"
                    );
                    self.interval = report.next_interval();
                }
                if let Some(health) = &self.health {
                    health.set_healthy(components::SCHEDULER).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Monitoring tick failed, retrying on next interval");
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::SCHEDULER, format!("Last tick failed: {}", e))
                        .await;
                }
            }
        }
    }
}

/// Pseudo-random delay in `0..max_ms`
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;

    nanos % max_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricSample;
    use crate::notifier::{EmailMessage, Mailer, Notifier, NotifyError, WebhookSender};
    use crate::sampler::MetricsSource;
    use crate::store::{MetricsStore, DEFAULT_BUSY_TIMEOUT};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::TempDir;

    struct CountingSource {
        next: AtomicI64,
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn collect(&self) -> MetricSample {
            MetricSample {
                timestamp: self.next.fetch_add(60, Ordering::SeqCst),
                cpu_usage: 5.0,
                ram_usage: 5.0,
                ram_total: 1000,
                ram_free: 950,
                io_read: 0.0,
                io_write: 0.0,
                database_connections: 0,
                database_slow_queries: 0,
            }
        }
    }

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    #[test]
    fn test_rand_jitter() {
        assert!(rand_jitter(1000) < 1000);
        assert_eq!(rand_jitter(0), 0);
    }

    #[tokio::test]
    async fn test_loop_ticks_until_shutdown() {
        let dir = TempDir::new().unwrap();
        let store = MetricsStore::open(dir.path().join("metrics.db"), DEFAULT_BUSY_TIMEOUT)
            .await
            .unwrap();
        let notifier = Notifier::new(
            "web01",
            Arc::new(NullMailer),
            WebhookSender::new(Duration::from_secs(1)).unwrap(),
        );
        let pipeline = Pipeline::builder()
            .source(Arc::new(CountingSource {
                next: AtomicI64::new(1000),
            }))
            .store(store.clone())
            .notifier(Arc::new(notifier))
            .build()
            .unwrap();

        let health = HealthRegistry::with_all_components().await;
        let (tx, rx) = broadcast::channel(1);
        let tick_loop = TickLoop::new(Arc::new(pipeline))
            .with_health(health.clone())
            .with_jitter(Duration::ZERO);

        let handle = tokio::spawn(tick_loop.run(rx));

        // The first tick runs immediately, then the loop sleeps for 60s
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(()).unwrap();

        let ticks = handle.await.unwrap();
        assert_eq!(ticks, 1);
        assert_eq!(store.latest().await.unwrap().unwrap().timestamp, 1000);
        assert_eq!(
            health.health().await.components[components::SCHEDULER].status,
            crate::health::ComponentStatus::Healthy
        );
    }
}
