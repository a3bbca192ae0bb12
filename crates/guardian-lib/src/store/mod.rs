//! Durable metrics and alert store
//!
//! Backed by a single SQLite file holding three tables: `metrics` (one row
//! per tick), `alerts` (one row per raised alert) and `config` (flat
//! key-value settings). The database runs in WAL mode with a bounded busy
//! timeout so dashboard reads can overlap with a tick's write without either
//! side failing immediately on lock contention.

mod schema;

#[cfg(test)]
mod tests;

use crate::models::{
    AlertEvent, AlertFilter, AlertStat, AverageMetrics, MetricSample, MetricType, Severity,
};
use crate::settings::Settings;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default time a connection waits on a locked database before giving up
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys submitted by settings forms that are never persisted
const FORM_CONTROL_KEYS: &[&str] = &["send", "cancel"];

/// Errors raised by the metrics store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to prepare store directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open metrics store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error("storage operation failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Rows removed by a retention pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneCounts {
    pub samples: u64,
    pub alerts: u64,
}

impl PruneCounts {
    pub fn total(&self) -> u64 {
        self.samples + self.alerts
    }
}

/// Handle to the SQLite metrics store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl MetricsStore {
    /// Open (creating if needed) the store at `path` and apply the schema
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(busy_timeout)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        let store = Self { pool, path };
        store.migrate().await?;

        info!(path = %store.path.display(), "Metrics store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close every pooled connection; later operations fail
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Cheap liveness probe used by health checks
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Append one sample, returning its row id
    pub async fn record(&self, sample: &MetricSample) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO metrics
             (timestamp, cpu_usage, ram_usage, ram_total, ram_free,
              io_read, io_write, database_connections, database_slow_queries)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(sample.timestamp)
        .bind(sample.cpu_usage)
        .bind(sample.ram_usage)
        .bind(to_db_int(sample.ram_total))
        .bind(to_db_int(sample.ram_free))
        .bind(sample.io_read)
        .bind(sample.io_write)
        .bind(to_db_int(sample.database_connections))
        .bind(to_db_int(sample.database_slow_queries))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent sample, or `None` when nothing has been recorded yet
    pub async fn latest(&self) -> Result<Option<MetricSample>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM metrics ORDER BY timestamp DESC, id DESC LIMIT 1",
            SAMPLE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| sample_from_row(&r)).transpose().map_err(Into::into)
    }

    /// Samples with `timestamp >= since`, oldest first
    pub async fn range(&self, since: i64) -> Result<Vec<MetricSample>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM metrics WHERE timestamp >= ? ORDER BY timestamp ASC, id ASC",
            SAMPLE_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(sample_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Average, maximum and minimum CPU/RAM usage since `since`
    pub async fn average(&self, since: i64) -> Result<AverageMetrics, StoreError> {
        let row = sqlx::query(
            "SELECT AVG(cpu_usage), AVG(ram_usage),
                    MAX(cpu_usage), MAX(ram_usage),
                    MIN(cpu_usage), MIN(ram_usage)
             FROM metrics WHERE timestamp >= ?",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(AverageMetrics {
            avg_cpu: row.try_get(0)?,
            avg_ram: row.try_get(1)?,
            max_cpu: row.try_get(2)?,
            max_ram: row.try_get(3)?,
            min_cpu: row.try_get(4)?,
            min_ram: row.try_get(5)?,
        })
    }

    /// Append one alert, returning its row id
    pub async fn record_alert(&self, alert: &AlertEvent) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO alerts
             (timestamp, alert_type, severity, message, metric_value, threshold_value,
              resolved, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.timestamp)
        .bind(alert.metric_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.metric_value)
        .bind(alert.threshold_value)
        .bind(alert.resolved)
        .bind(alert.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Number of (type, severity) alerts created strictly after `since`
    pub async fn alerts_since(
        &self,
        metric_type: &MetricType,
        severity: Severity,
        since: i64,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts
             WHERE alert_type = ? AND severity = ? AND timestamp > ?",
        )
        .bind(metric_type.as_str())
        .bind(severity.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    /// Every alert created strictly after `since`, oldest first.
    /// Feeds the evaluator's cooldown check.
    pub async fn alert_history(&self, since: i64) -> Result<Vec<AlertEvent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM alerts WHERE timestamp > ? ORDER BY timestamp ASC, id ASC",
            ALERT_COLUMNS
        ))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(alert_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Newest alerts first, with optional type and severity filters
    pub async fn recent_alerts(&self, filter: &AlertFilter) -> Result<Vec<AlertEvent>, StoreError> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM alerts WHERE 1=1",
            ALERT_COLUMNS
        ));

        if let Some(metric_type) = &filter.metric_type {
            query
                .push(" AND alert_type = ")
                .push_bind(metric_type.as_str().to_string());
        }
        if let Some(severity) = filter.severity {
            query.push(" AND severity = ").push_bind(severity.as_str());
        }
        query
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(filter.limit.max(0));

        let rows = query.build().fetch_all(&self.pool).await?;

        rows.iter()
            .map(alert_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    /// Alert counts grouped by type and severity
    pub async fn alert_stats(&self) -> Result<Vec<AlertStat>, StoreError> {
        let rows = sqlx::query(
            "SELECT alert_type, severity, COUNT(*) FROM alerts
             GROUP BY alert_type, severity
             ORDER BY alert_type, severity",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let alert_type: String = row.try_get(0)?;
            let count: i64 = row.try_get(2)?;
            stats.push(AlertStat {
                alert_type: MetricType::from(alert_type),
                severity: severity_from_row(&row, 1)?,
                count: count.max(0) as u64,
            });
        }
        Ok(stats)
    }

    /// Mark one alert resolved. Returns `false` when no such alert exists.
    pub async fn resolve_alert(&self, id: i64, resolved_at: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE alerts SET resolved = 1, resolved_at = ? WHERE id = ?")
            .bind(resolved_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the whole alert log, returning the number of rows removed
    pub async fn clear_alerts(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM alerts").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Delete samples and alerts with `timestamp < cutoff` in one transaction
    pub async fn prune_older_than(&self, cutoff: i64) -> Result<PruneCounts, StoreError> {
        let mut tx = self.pool.begin().await?;

        let samples = sqlx::query("DELETE FROM metrics WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let alerts = sqlx::query("DELETE FROM alerts WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        debug!(cutoff = cutoff, samples = samples, alerts = alerts, "Pruned old rows");
        Ok(PruneCounts { samples, alerts })
    }

    /// Snapshot of the configuration table
    pub async fn load_settings(&self) -> Result<Settings, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM config")
            .fetch_all(&self.pool)
            .await?;

        let mut values = BTreeMap::new();
        for row in rows {
            values.insert(row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?);
        }
        Ok(Settings::from_map(values))
    }

    /// Upsert every key of `values`; form control keys are skipped.
    /// Returns the number of keys written.
    pub async fn save_settings(
        &self,
        values: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for (key, value) in values {
            if FORM_CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }

            sqlx::query("INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }
}

const SAMPLE_COLUMNS: &str = "timestamp, cpu_usage, ram_usage, ram_total, ram_free, \
     io_read, io_write, database_connections, database_slow_queries";

const ALERT_COLUMNS: &str = "id, timestamp, alert_type, severity, message, \
     metric_value, threshold_value, resolved, resolved_at";

fn to_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db_int(value: i64) -> u64 {
    value.max(0) as u64
}

fn sample_from_row(row: &SqliteRow) -> Result<MetricSample, sqlx::Error> {
    Ok(MetricSample {
        timestamp: row.try_get("timestamp")?,
        cpu_usage: row.try_get("cpu_usage")?,
        ram_usage: row.try_get("ram_usage")?,
        ram_total: from_db_int(row.try_get("ram_total")?),
        ram_free: from_db_int(row.try_get("ram_free")?),
        io_read: row.try_get("io_read")?,
        io_write: row.try_get("io_write")?,
        database_connections: from_db_int(row.try_get("database_connections")?),
        database_slow_queries: from_db_int(row.try_get("database_slow_queries")?),
    })
}

fn alert_from_row(row: &SqliteRow) -> Result<AlertEvent, sqlx::Error> {
    let alert_type: String = row.try_get("alert_type")?;

    Ok(AlertEvent {
        id: Some(row.try_get("id")?),
        timestamp: row.try_get("timestamp")?,
        metric_type: MetricType::from(alert_type),
        severity: severity_from_row(row, 3)?,
        message: row.try_get("message")?,
        metric_value: row.try_get("metric_value")?,
        threshold_value: row.try_get("threshold_value")?,
        resolved: row.try_get("resolved")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn severity_from_row(row: &SqliteRow, index: usize) -> Result<Severity, sqlx::Error> {
    let raw: String = row.try_get(index)?;
    raw.parse::<Severity>().map_err(|e| sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: e.into(),
    })
}
