//! Host metrics sampling
//!
//! The sampler reads load average and memory figures from procfs and asks an
//! optional database probe for connection counters. Every sub-metric fails
//! independently: a missing file or unreachable engine yields zero for that
//! field and a warning, never an error for the whole sample.

mod database;
mod procfs;

pub use database::{DatabaseProbe, DatabaseStats, MySqlProbe, DEFAULT_PROBE_TIMEOUT};
pub use procfs::{count_processors, parse_loadavg, parse_meminfo, MemInfo};

use crate::models::{round2, MetricSample};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::warn;

/// Anything able to produce one metrics snapshot per tick
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn collect(&self) -> MetricSample;
}

/// procfs-backed sampler
pub struct Sampler {
    proc_path: PathBuf,
    database: Option<Arc<dyn DatabaseProbe>>,
    cpu_count: OnceCell<usize>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::with_proc_path("/proc")
    }

    /// Create a sampler reading from an alternative procfs root
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
            database: None,
            cpu_count: OnceCell::new(),
        }
    }

    pub fn with_database_probe(mut self, probe: Arc<dyn DatabaseProbe>) -> Self {
        self.database = Some(probe);
        self
    }

    /// Forget the cached core count so the next sample probes it again
    pub fn reset(&mut self) {
        self.cpu_count = OnceCell::new();
    }

    /// Logical core count, probed once and then cached
    pub async fn cpu_count(&self) -> usize {
        *self
            .cpu_count
            .get_or_init(|| async {
                match fs::read_to_string(self.proc_path.join("cpuinfo")).await {
                    Ok(content) => count_processors(&content),
                    Err(e) => {
                        warn!(error = %e, "Failed to read cpuinfo, assuming one core");
                        1
                    }
                }
            })
            .await
    }

    async fn cpu_usage(&self) -> Result<f64> {
        let content = fs::read_to_string(self.proc_path.join("loadavg"))
            .await
            .context("Failed to read loadavg")?;
        let load = parse_loadavg(&content).context("Malformed loadavg")?;
        let cores = self.cpu_count().await;

        Ok(round2((load / cores as f64 * 100.0).min(100.0)))
    }

    async fn memory(&self) -> Result<MemInfo> {
        let content = fs::read_to_string(self.proc_path.join("meminfo"))
            .await
            .context("Failed to read meminfo")?;
        Ok(parse_meminfo(&content))
    }

    async fn database_stats(&self) -> DatabaseStats {
        let Some(probe) = &self.database else {
            return DatabaseStats::default();
        };

        match probe.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Database statistics unavailable");
                DatabaseStats::default()
            }
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for Sampler {
    async fn collect(&self) -> MetricSample {
        let timestamp = chrono::Utc::now().timestamp();

        let cpu_usage = self.cpu_usage().await.unwrap_or_else(|e| {
            warn!(error = %e, "CPU usage unavailable");
            0.0
        });

        let memory = self.memory().await.unwrap_or_else(|e| {
            warn!(error = %e, "Memory usage unavailable");
            MemInfo::default()
        });

        let database = self.database_stats().await;

        MetricSample {
            timestamp,
            cpu_usage,
            ram_usage: round2(memory.usage_percent().clamp(0.0, 100.0)),
            ram_total: memory.total_kb,
            ram_free: memory.usable_kb(),
            // Disk I/O rates are not sampled yet
            io_read: 0.0,
            io_write: 0.0,
            database_connections: database.connections,
            database_slow_queries: database.slow_queries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedProbe(DatabaseStats);

    #[async_trait]
    impl DatabaseProbe for FixedProbe {
        async fn stats(&self) -> Result<DatabaseStats> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl DatabaseProbe for FailingProbe {
        async fn stats(&self) -> Result<DatabaseStats> {
            anyhow::bail!("connection refused")
        }
    }

    async fn fake_proc(loadavg: &str, cores: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        let cpuinfo: String = (0..cores)
            .map(|i| format!("processor\t: {}\nmodel name\t: Fake CPU\n\n", i))
            .collect();

        fs::write(dir.path().join("cpuinfo"), cpuinfo).await.unwrap();
        fs::write(dir.path().join("loadavg"), loadavg).await.unwrap();
        fs::write(
            dir.path().join("meminfo"),
            "MemTotal: 8000000 kB\nMemFree: 1000000 kB\nMemAvailable: 2000000 kB\n",
        )
        .await
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_collect_from_fake_proc() {
        let dir = fake_proc("1.00 0.50 0.25 1/100 42\n", 4).await;
        let sampler = Sampler::with_proc_path(dir.path()).with_database_probe(Arc::new(
            FixedProbe(DatabaseStats {
                connections: 7,
                slow_queries: 2,
            }),
        ));

        let sample = sampler.collect().await;
        assert_eq!(sample.cpu_usage, 25.0);
        assert_eq!(sample.ram_usage, 75.0);
        assert_eq!(sample.ram_total, 8_000_000);
        assert_eq!(sample.ram_free, 2_000_000);
        assert_eq!(sample.io_read, 0.0);
        assert_eq!(sample.io_write, 0.0);
        assert_eq!(sample.database_connections, 7);
        assert_eq!(sample.database_slow_queries, 2);
        assert!(sample.timestamp > 0);
    }

    #[tokio::test]
    async fn test_cpu_usage_capped_at_100() {
        let dir = fake_proc("12.00 8.00 4.00 1/100 42\n", 2).await;
        let sampler = Sampler::with_proc_path(dir.path());

        assert_eq!(sampler.collect().await.cpu_usage, 100.0);
    }

    #[tokio::test]
    async fn test_missing_files_fall_back_to_zero() {
        let dir = TempDir::new().unwrap();
        let sampler =
            Sampler::with_proc_path(dir.path()).with_database_probe(Arc::new(FailingProbe));

        let sample = sampler.collect().await;
        assert_eq!(sample.cpu_usage, 0.0);
        assert_eq!(sample.ram_usage, 0.0);
        assert_eq!(sample.ram_total, 0);
        assert_eq!(sample.database_connections, 0);
    }

    #[tokio::test]
    async fn test_cpu_count_cached_until_reset() {
        let dir = fake_proc("1.00 0.50 0.25 1/100 42\n", 2).await;
        let mut sampler = Sampler::with_proc_path(dir.path());
        assert_eq!(sampler.cpu_count().await, 2);

        fs::write(
            dir.path().join("cpuinfo"),
            "processor : 0\nprocessor : 1\nprocessor : 2\nprocessor : 3\n",
        )
        .await
        .unwrap();
        assert_eq!(sampler.cpu_count().await, 2);

        sampler.reset();
        assert_eq!(sampler.cpu_count().await, 4);
    }
}
