//! SQLite schema, applied idempotently on open

pub(super) const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        cpu_usage REAL NOT NULL DEFAULT 0,
        ram_usage REAL NOT NULL DEFAULT 0,
        ram_total INTEGER NOT NULL DEFAULT 0,
        ram_free INTEGER NOT NULL DEFAULT 0,
        io_read REAL NOT NULL DEFAULT 0,
        io_write REAL NOT NULL DEFAULT 0,
        database_connections INTEGER NOT NULL DEFAULT 0,
        database_slow_queries INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp)",
    "CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER NOT NULL,
        alert_type TEXT NOT NULL,
        severity TEXT NOT NULL,
        message TEXT NOT NULL,
        metric_value REAL NOT NULL DEFAULT 0,
        threshold_value REAL NOT NULL DEFAULT 0,
        resolved INTEGER NOT NULL DEFAULT 0,
        resolved_at INTEGER
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_alerts_type_severity
        ON alerts(alert_type, severity, timestamp)",
    "CREATE TABLE IF NOT EXISTS config (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];
