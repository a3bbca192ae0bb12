//! Component health tracking for the guardian service
//!
//! Each pipeline stage reports its state here after every tick; the HTTP
//! layer turns the aggregate into liveness and readiness responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Working, but the last tick hit a recoverable problem
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn at_now(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::at_now(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    /// Sample timestamp of the last completed tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<i64>,
}

impl HealthResponse {
    /// Worst status wins
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Tracked component names
pub mod components {
    pub const SAMPLER: &str = "sampler";
    pub const STORE: &str = "store";
    pub const NOTIFIER: &str = "notifier";
    pub const SCHEDULER: &str = "scheduler";

    pub const ALL: &[&str] = &[SAMPLER, STORE, NOTIFIER, SCHEDULER];
}

/// Shared, cloneable health state
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
    last_tick: Arc<RwLock<Option<i64>>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
            last_tick: Arc::new(RwLock::new(None)),
        }
    }

    /// Registry with every tracked component registered as healthy
    pub async fn with_all_components() -> Self {
        let registry = Self::new();
        for name in components::ALL {
            registry.register(name).await;
        }
        registry
    }

    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components
            .write()
            .await
            .insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn record_tick(&self, sample_timestamp: i64) {
        *self.last_tick.write().await = Some(sample_timestamp);
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        let last_tick = *self.last_tick.read().await;

        HealthResponse {
            status,
            components,
            last_tick,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let reason = if !ready {
            Some("Guardian not yet initialized".to_string())
        } else if !health.status.is_operational() {
            let failing: Vec<&str> = health
                .components
                .iter()
                .filter(|(_, c)| !c.status.is_operational())
                .map(|(name, _)| name.as_str())
                .collect();
            Some(format!("Unhealthy components: {}", failing.join(", ")))
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
        }
    }
}
