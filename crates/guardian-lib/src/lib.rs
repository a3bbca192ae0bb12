//! Core library for the resource guardian
//!
//! This crate provides:
//! - Host metrics sampling (CPU, RAM, database counters)
//! - A durable SQLite store for samples, alerts and settings
//! - Threshold evaluation with cooldown deduplication
//! - Email and webhook notification with chat platform formatting
//! - The per-tick pipeline, an in-process scheduler and a query facade
//! - Health checks and observability

pub mod evaluator;
pub mod health;
pub mod models;
pub mod notifier;
pub mod observability;
pub mod pipeline;
pub mod sampler;
pub mod schedule;
pub mod service;
pub mod settings;
pub mod store;

pub use evaluator::{AlertHistory, Evaluation, ThresholdEvaluator};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use notifier::{Channel, ChannelOutcome, DispatchReport, Notifier, NotifyError};
pub use observability::{GuardianMetrics, StructuredLogger};
pub use pipeline::{Pipeline, PipelineBuilder, TickReport};
pub use sampler::{MetricsSource, Sampler};
pub use schedule::TickLoop;
pub use service::{GuardianService, ServiceError};
pub use settings::Settings;
pub use store::{MetricsStore, StoreError};
