use super::*;
use tempfile::TempDir;

async fn open_store() -> (TempDir, MetricsStore) {
    let dir = TempDir::new().unwrap();
    let store = MetricsStore::open(dir.path().join("metrics.db"), DEFAULT_BUSY_TIMEOUT)
        .await
        .unwrap();
    (dir, store)
}

fn sample_at(timestamp: i64, cpu: f64, ram: f64) -> MetricSample {
    MetricSample {
        timestamp,
        cpu_usage: cpu,
        ram_usage: ram,
        ram_total: 16_384_000,
        ram_free: 4_096_000,
        io_read: 0.0,
        io_write: 0.0,
        database_connections: 12,
        database_slow_queries: 3,
    }
}

#[tokio::test]
async fn test_record_and_latest_round_trip() {
    let (_dir, store) = open_store().await;

    assert!(store.latest().await.unwrap().is_none());

    let first = sample_at(1000, 12.5, 40.25);
    let second = sample_at(1060, 33.33, 66.67);
    store.record(&first).await.unwrap();
    store.record(&second).await.unwrap();

    let latest = store.latest().await.unwrap().unwrap();
    assert_eq!(latest, second);
}

#[tokio::test]
async fn test_range_is_inclusive_and_ordered() {
    let (_dir, store) = open_store().await;

    for ts in [1000, 1100, 1200, 1300] {
        store.record(&sample_at(ts, 10.0, 20.0)).await.unwrap();
    }

    let samples = store.range(1100).await.unwrap();
    let timestamps: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![1100, 1200, 1300]);
}

#[tokio::test]
async fn test_average_over_window() {
    let (_dir, store) = open_store().await;

    let empty = store.average(0).await.unwrap();
    assert_eq!(empty, AverageMetrics::default());

    store.record(&sample_at(1000, 10.0, 50.0)).await.unwrap();
    store.record(&sample_at(1100, 30.0, 70.0)).await.unwrap();
    store.record(&sample_at(500, 99.0, 99.0)).await.unwrap();

    let avg = store.average(1000).await.unwrap();
    assert_eq!(avg.avg_cpu, Some(20.0));
    assert_eq!(avg.avg_ram, Some(60.0));
    assert_eq!(avg.max_cpu, Some(30.0));
    assert_eq!(avg.min_ram, Some(50.0));
}

#[tokio::test]
async fn test_alerts_since_is_strict() {
    let (_dir, store) = open_store().await;

    let alert = AlertEvent::new(1000, MetricType::Cpu, Severity::Warning, 75.0, 70.0);
    let id = store.record_alert(&alert).await.unwrap();
    assert!(id > 0);

    assert_eq!(
        store
            .alerts_since(&MetricType::Cpu, Severity::Warning, 999)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .alerts_since(&MetricType::Cpu, Severity::Warning, 1000)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .alerts_since(&MetricType::Cpu, Severity::Critical, 0)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_alert_history_and_filters() {
    let (_dir, store) = open_store().await;

    store
        .record_alert(&AlertEvent::new(1000, MetricType::Cpu, Severity::Warning, 75.0, 70.0))
        .await
        .unwrap();
    store
        .record_alert(&AlertEvent::new(1100, MetricType::Ram, Severity::Critical, 95.0, 90.0))
        .await
        .unwrap();
    store
        .record_alert(&AlertEvent::new(1200, MetricType::Cpu, Severity::Critical, 90.0, 85.0))
        .await
        .unwrap();

    let history = store.alert_history(1000).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].timestamp, 1100);

    let all = store
        .recent_alerts(&AlertFilter {
            limit: 50,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].timestamp, 1200);
    assert!(all.iter().all(|a| a.id.is_some()));

    let cpu_only = store
        .recent_alerts(&AlertFilter {
            limit: 50,
            metric_type: Some(MetricType::Cpu),
            severity: None,
        })
        .await
        .unwrap();
    assert_eq!(cpu_only.len(), 2);

    let critical_cpu = store
        .recent_alerts(&AlertFilter {
            limit: 50,
            metric_type: Some(MetricType::Cpu),
            severity: Some(Severity::Critical),
        })
        .await
        .unwrap();
    assert_eq!(critical_cpu.len(), 1);
    assert_eq!(critical_cpu[0].metric_value, 90.0);

    let limited = store
        .recent_alerts(&AlertFilter {
            limit: 1,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_alert_stats_grouping() {
    let (_dir, store) = open_store().await;

    for ts in [1000, 1001, 1002] {
        store
            .record_alert(&AlertEvent::new(ts, MetricType::Cpu, Severity::Warning, 75.0, 70.0))
            .await
            .unwrap();
    }
    store
        .record_alert(&AlertEvent::new(1003, MetricType::Ram, Severity::Critical, 95.0, 90.0))
        .await
        .unwrap();

    let stats = store.alert_stats().await.unwrap();
    assert_eq!(stats.len(), 2);

    let cpu = stats
        .iter()
        .find(|s| s.alert_type == MetricType::Cpu)
        .unwrap();
    assert_eq!(cpu.severity, Severity::Warning);
    assert_eq!(cpu.count, 3);
}

#[tokio::test]
async fn test_resolve_and_clear() {
    let (_dir, store) = open_store().await;

    let id = store
        .record_alert(&AlertEvent::new(1000, MetricType::Ram, Severity::Warning, 80.0, 75.0))
        .await
        .unwrap();

    assert!(store.resolve_alert(id, 2000).await.unwrap());
    assert!(!store.resolve_alert(id + 100, 2000).await.unwrap());

    let alerts = store
        .recent_alerts(&AlertFilter {
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(alerts[0].resolved);
    assert_eq!(alerts[0].resolved_at, Some(2000));

    assert_eq!(store.clear_alerts().await.unwrap(), 1);
    assert_eq!(store.alert_stats().await.unwrap().len(), 0);
}

#[tokio::test]
async fn test_prune_is_idempotent() {
    let (_dir, store) = open_store().await;

    store.record(&sample_at(100, 1.0, 1.0)).await.unwrap();
    store.record(&sample_at(5000, 1.0, 1.0)).await.unwrap();
    store
        .record_alert(&AlertEvent::new(100, MetricType::Cpu, Severity::Warning, 75.0, 70.0))
        .await
        .unwrap();

    let first = store.prune_older_than(1000).await.unwrap();
    assert_eq!(first, PruneCounts { samples: 1, alerts: 1 });
    assert_eq!(first.total(), 2);

    let second = store.prune_older_than(1000).await.unwrap();
    assert_eq!(second.total(), 0);

    assert_eq!(store.range(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_upsert_skips_form_keys() {
    let (_dir, store) = open_store().await;

    assert!(store.load_settings().await.unwrap().as_map().is_empty());

    let mut values = BTreeMap::new();
    values.insert("cpu_warning_threshold".to_string(), "65".to_string());
    values.insert("send".to_string(), "Save".to_string());
    values.insert("cancel".to_string(), "".to_string());
    assert_eq!(store.save_settings(&values).await.unwrap(), 1);

    let mut update = BTreeMap::new();
    update.insert("cpu_warning_threshold".to_string(), "60".to_string());
    update.insert("webhook_url".to_string(), "https://example.com".to_string());
    store.save_settings(&update).await.unwrap();

    let settings = store.load_settings().await.unwrap();
    assert_eq!(settings.get("cpu_warning_threshold"), Some("60"));
    assert_eq!(settings.get("webhook_url"), Some("https://example.com"));
    assert!(!settings.contains("send"));
    assert!(!settings.contains("cancel"));
}

#[tokio::test]
async fn test_reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("metrics.db");

    {
        let store = MetricsStore::open(&path, DEFAULT_BUSY_TIMEOUT).await.unwrap();
        store.record(&sample_at(1000, 5.0, 6.0)).await.unwrap();
        store.ping().await.unwrap();
    }

    let store = MetricsStore::open(&path, DEFAULT_BUSY_TIMEOUT).await.unwrap();
    assert_eq!(store.latest().await.unwrap().unwrap().timestamp, 1000);
}

#[tokio::test]
async fn test_reads_and_writes_overlap_an_open_write() {
    use sqlx::{Connection, SqliteConnection};

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.db");
    let store = MetricsStore::open(&path, Duration::from_secs(2)).await.unwrap();
    store.record(&sample_at(1000, 10.0, 20.0)).await.unwrap();

    let options = SqliteConnectOptions::new().filename(&path);
    let mut writer = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::query("BEGIN IMMEDIATE").execute(&mut writer).await.unwrap();
    sqlx::query(
        "INSERT INTO metrics (timestamp, cpu_usage, ram_usage, ram_total, ram_free, \
         io_read, io_write, database_connections, database_slow_queries) \
         VALUES (1060, 50.0, 50.0, 0, 0, 0, 0, 0, 0)",
    )
    .execute(&mut writer)
    .await
    .unwrap();

    // Uncommitted rows stay invisible to readers
    let latest = store.latest().await.unwrap().unwrap();
    assert_eq!(latest.timestamp, 1000);

    let contended = store.clone();
    let handle = tokio::spawn(async move { contended.record(&sample_at(1120, 30.0, 40.0)).await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished());
    sqlx::query("COMMIT").execute(&mut writer).await.unwrap();
    writer.close().await.unwrap();

    handle.await.unwrap().unwrap();
    let timestamps: Vec<i64> = store.range(0).await.unwrap().iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![1000, 1060, 1120]);
}
