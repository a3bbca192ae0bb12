//! Integration tests for the guardian API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use guardian_lib::{
    health::{components, HealthRegistry},
    notifier::{EmailMessage, Mailer, NotifyError, WebhookSender, DEFAULT_WEBHOOK_TIMEOUT},
    store::DEFAULT_BUSY_TIMEOUT,
    AlertEvent, GuardianService, MetricSample, MetricType, MetricsStore, Notifier, Severity,
};
use resource_guardian::api::{self, create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct NullMailer;

#[async_trait]
impl Mailer for NullMailer {
    async fn send(&self, _message: &EmailMessage) -> Result<(), NotifyError> {
        Ok(())
    }
}

struct TestApp {
    _dir: TempDir,
    router: Router,
    state: Arc<AppState>,
}

impl TestApp {
    fn store(&self) -> &MetricsStore {
        self.state.service.store()
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn post(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }
}

async fn setup_test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = MetricsStore::open(dir.path().join("metrics.db"), DEFAULT_BUSY_TIMEOUT)
        .await
        .unwrap();
    let notifier = Notifier::new(
        "web01",
        Arc::new(NullMailer),
        WebhookSender::new(DEFAULT_WEBHOOK_TIMEOUT).unwrap(),
    );

    let health_registry = HealthRegistry::with_all_components().await;
    let service = GuardianService::new(store, Arc::new(notifier));
    let state = Arc::new(AppState::new(service, health_registry));

    TestApp {
        _dir: dir,
        router: create_router(state.clone()),
        state,
    }
}

fn sample(timestamp: i64, cpu: f64) -> MetricSample {
    MetricSample {
        timestamp,
        cpu_usage: cpu,
        ram_usage: 40.0,
        ram_total: 8_000_000,
        ram_free: 4_800_000,
        io_read: 0.0,
        io_write: 0.0,
        database_connections: 3,
        database_slow_queries: 0,
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app().await;

    let (status, health) = app.get("/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_store_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::STORE, "database is locked")
        .await;

    let (status, health) = app.get("/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_ready_flag() {
    let app = setup_test_app().await;

    let (status, readiness) = app.get("/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;
    let (status, readiness) = app.get("/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn test_current_without_data_is_404() {
    let app = setup_test_app().await;

    let (status, body) = app.get("/api/v1/current").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "error", "message": "No data available"}));
}

#[tokio::test]
async fn test_current_returns_latest_sample() {
    let app = setup_test_app().await;
    let now = chrono::Utc::now().timestamp();
    app.store().record(&sample(now - 60, 12.5)).await.unwrap();
    app.store().record(&sample(now, 33.25)).await.unwrap();

    let (status, body) = app.get("/api/v1/current").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timestamp"], now);
    assert_eq!(body["cpu_usage"], 33.25);
}

#[tokio::test]
async fn test_metrics_range_clamps_hours() {
    let app = setup_test_app().await;
    let now = chrono::Utc::now().timestamp();
    app.store().record(&sample(now - 3 * 3600, 10.0)).await.unwrap();
    app.store().record(&sample(now - 60, 20.0)).await.unwrap();

    let (status, body) = app.get("/api/v1/metrics?hours=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/v1/metrics?hours=1000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.get("/api/v1/metrics/average?hours=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avg_cpu"], 15.0);
    assert_eq!(body["max_cpu"], 20.0);
}

#[tokio::test]
async fn test_alert_listing_and_filters() {
    let app = setup_test_app().await;
    for (ts, metric_type, severity) in [
        (1000, MetricType::Cpu, Severity::Warning),
        (1100, MetricType::Cpu, Severity::Critical),
        (1200, MetricType::Ram, Severity::Critical),
    ] {
        app.store()
            .record_alert(&AlertEvent::new(ts, metric_type, severity, 91.0, 85.0))
            .await
            .unwrap();
    }

    let (status, body) = app.get("/api/v1/alerts").await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 3);
    assert_eq!(alerts[0]["timestamp"], 1200);

    let (_, body) = app.get("/api/v1/alerts?type=cpu&severity=critical").await;
    let alerts = body.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["alert_type"], "cpu");
    assert_eq!(alerts[0]["severity"], "critical");

    let (_, body) = app.get("/api/v1/alerts?limit=0").await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = app.get("/api/v1/alerts?severity=urgent").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = app.get("/api/v1/alerts/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_resolve_and_clear_alerts() {
    let app = setup_test_app().await;
    let id = app
        .store()
        .record_alert(&AlertEvent::new(1000, MetricType::Ram, Severity::Warning, 80.0, 75.0))
        .await
        .unwrap();

    let (status, body) = app.post("/api/v1/alerts/0/resolve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid alert ID");

    let (status, _) = app.post("/api/v1/alerts/9999/resolve").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post(&format!("/api/v1/alerts/{}/resolve", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = app.get("/api/v1/alerts").await;
    assert_eq!(body[0]["resolved"], true);

    let (status, body) = app.post("/api/v1/alerts/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, body) = app.get("/api/v1/alerts").await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_config_round_trip_skips_form_keys() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send_json(
            "PUT",
            "/api/v1/config",
            json!({"cpu_warning_threshold": "60", "alert_cooldown": "600", "send": "Save"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"], 2);

    let (status, body) = app.get("/api/v1/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpu_warning_threshold"], "60");
    assert_eq!(body["alert_cooldown"], "600");
    assert!(body.get("send").is_none());
}

#[tokio::test]
async fn test_test_email_validates_address() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send_json("POST", "/api/v1/test/email", json!({"address": "ops@example.com"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, body) = app
        .send_json("POST", "/api/v1/test/email", json!({"address": "not-an-address"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_test_webhook_rejects_invalid_url() {
    let app = setup_test_app().await;

    let (status, body) = app
        .send_json("POST", "/api/v1/test/webhook", json!({"url": "ftp://example.com/hook"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_serve_fails_when_port_is_taken() {
    let app = setup_test_app().await;
    let occupied = tokio::net::TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        api::serve(port, app.state.clone()),
    )
    .await
    .expect("serve should return instead of listening");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Failed to bind API server"));
}
