//! HTTP API for the dashboard, health checks and Prometheus metrics

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use guardian_lib::{
    health::{ComponentStatus, HealthRegistry},
    notifier::NotifyError,
    observability::render_metrics,
    service::ServiceError,
    AlertEvent, AlertFilter, AlertStat, AverageMetrics, GuardianService, MetricSample,
    MetricType, Settings, Severity,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_HOURS: i64 = 24;
const DEFAULT_ALERT_LIMIT: i64 = 50;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: GuardianService,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(service: GuardianService, health_registry: HealthRegistry) -> Self {
        Self {
            service,
            health_registry,
        }
    }
}

/// Error payload: `{"status":"error","message":...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Store(e) => {
                error!(error = %e, "Store query failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            }
            ServiceError::NotFound(message) => Self::new(StatusCode::NOT_FOUND, message),
            ServiceError::InvalidArgument(message) => Self::bad_request(message),
            ServiceError::Notify(
                e @ (NotifyError::InvalidAddress(_) | NotifyError::InvalidUrl(_)),
            ) => Self::bad_request(e.to_string()),
            ServiceError::Notify(e) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "status": "error", "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn success(message: impl Into<String>) -> Value {
    json!({ "status": "success", "message": message.into() })
}

/// Health check response - returns 200 unless a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    match render_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn current(State(state): State<Arc<AppState>>) -> ApiResult<MetricSample> {
    state
        .service
        .latest_sample()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No data available"))
}

#[derive(Debug, Deserialize)]
struct HoursQuery {
    hours: Option<i64>,
}

async fn sample_range(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HoursQuery>,
) -> ApiResult<Vec<MetricSample>> {
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    Ok(Json(state.service.sample_range(hours).await?))
}

async fn average(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HoursQuery>,
) -> ApiResult<AverageMetrics> {
    let hours = query.hours.unwrap_or(DEFAULT_HOURS);
    Ok(Json(state.service.average_metrics(hours).await?))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    limit: Option<i64>,
    #[serde(rename = "type")]
    alert_type: Option<String>,
    severity: Option<String>,
}

impl AlertsQuery {
    fn into_filter(self) -> Result<AlertFilter, ApiError> {
        let severity = match self.severity.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<Severity>().map_err(ApiError::bad_request)?),
            None => None,
        };

        Ok(AlertFilter {
            limit: self.limit.unwrap_or(DEFAULT_ALERT_LIMIT),
            metric_type: self
                .alert_type
                .filter(|t| !t.is_empty())
                .map(MetricType::from),
            severity,
        })
    }
}

async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Vec<AlertEvent>> {
    let filter = query.into_filter()?;
    Ok(Json(state.service.recent_alerts(filter).await?))
}

async fn alert_stats(State(state): State<Arc<AppState>>) -> ApiResult<Vec<AlertStat>> {
    Ok(Json(state.service.alert_stats().await?))
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    state.service.resolve_alert(id).await?;
    Ok(Json(success(format!("Alert {} resolved", id))))
}

async fn clear_alerts(State(state): State<Arc<AppState>>) -> ApiResult<Value> {
    let removed = state.service.clear_all_alerts().await?;
    let mut body = success("All alerts cleared");
    body["removed"] = json!(removed);
    Ok(Json(body))
}

async fn get_config(State(state): State<Arc<AppState>>) -> ApiResult<Settings> {
    Ok(Json(state.service.settings().await?))
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(values): Json<BTreeMap<String, String>>,
) -> ApiResult<Value> {
    let saved = state.service.save_config(&values).await?;
    let mut body = success("Configuration saved");
    body["saved"] = json!(saved);
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct TestEmailRequest {
    address: String,
}

async fn test_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestEmailRequest>,
) -> ApiResult<Value> {
    state.service.test_email(&request.address).await?;
    Ok(Json(success(format!("Test email sent to {}", request.address))))
}

#[derive(Debug, Deserialize)]
struct TestWebhookRequest {
    url: String,
}

async fn test_webhook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestWebhookRequest>,
) -> ApiResult<Value> {
    let platform = state.service.test_webhook(&request.url).await?;
    let mut body = success("Test webhook delivered");
    body["platform"] = json!(platform);
    Ok(Json(body))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/current", get(current))
        .route("/metrics", get(sample_range))
        .route("/metrics/average", get(average))
        .route("/alerts", get(alerts))
        .route("/alerts/stats", get(alert_stats))
        .route("/alerts/clear", post(clear_alerts))
        .route("/alerts/:id/resolve", post(resolve_alert))
        .route("/config", get(get_config).put(put_config))
        .route("/test/email", post(test_email))
        .route("/test/webhook", post(test_webhook));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .nest("/api/v1", api)
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
