//! API client for the Resource Guardian dashboard API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Failure reported by the guardian API itself
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("API error ({status}): {message}")]
    Status { status: StatusCode, message: String },
}

/// API client for the guardian `serve` endpoint
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.client.get(self.url(path)?);
        self.execute(request).await
    }

    /// GET that maps a 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(ApiError::NotFound { .. }) => Ok(None),
                _ => Err(e),
            },
        }
    }

    /// GET a health endpoint, whose 503 responses still carry a report
    pub async fn get_report<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        response.json().await.context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.post(self.url(path)?).json(body);
        self.execute(request).await
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.client.put(self.url(path)?).json(body);
        self.execute(request).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;
        let response = check_status(response).await?;
        response.json().await.context("Failed to parse response")
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.message)
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound { message }.into());
    }
    Err(ApiError::Status { status, message }.into())
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub cpu_usage: f64,
    pub ram_usage: f64,
    pub ram_total: u64,
    pub ram_free: u64,
    pub io_read: f64,
    pub io_write: f64,
    pub database_connections: u64,
    pub database_slow_queries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Averages {
    pub avg_cpu: Option<f64>,
    pub avg_ram: Option<f64>,
    pub max_cpu: Option<f64>,
    pub max_ram: Option<f64>,
    pub min_cpu: Option<f64>,
    pub min_ram: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: Option<i64>,
    pub timestamp: i64,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStat {
    pub alert_type: String,
    pub severity: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
    #[serde(default)]
    pub last_tick: Option<i64>,
}

/// Success payload of command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestEmailRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestWebhookRequest {
    pub url: String,
}
