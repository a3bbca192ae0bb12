//! Resource Guardian - host resource monitor
//!
//! `tick` (the default) runs a single sample/evaluate/notify pass and exits,
//! suitable for cron. `serve` keeps running, ticking on the configured
//! interval and exposing the dashboard API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guardian_lib::{
    health::HealthRegistry,
    notifier::{SmtpMailer, WebhookSender},
    observability::StructuredLogger,
    sampler::MySqlProbe,
    GuardianService, MetricsStore, Notifier, Pipeline, Sampler, TickLoop,
};
use resource_guardian::{api, config::GuardianConfig};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const GUARDIAN_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "resource-guardian")]
#[command(about = "Host resource monitor with threshold alerting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one monitoring pass and exit
    Tick,
    /// Tick on the configured interval and serve the dashboard API
    Serve {
        /// API port, overrides GUARDIAN_API_PORT
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Everything a tick needs, wired from process configuration
struct Components {
    store: MetricsStore,
    notifier: Arc<Notifier>,
    pipeline: Pipeline,
}

async fn build_components(
    config: &GuardianConfig,
    health: Option<HealthRegistry>,
) -> Result<Components> {
    let store = MetricsStore::open(&config.db_path, config.busy_timeout())
        .await
        .with_context(|| format!("Failed to open metrics store {}", config.db_path.display()))?;

    let mut sampler = Sampler::new();
    if let Some(url) = config.active_database_url() {
        let mysql = MySqlProbe::new(url).with_timeout(config.database_timeout());
        sampler = sampler.with_database_probe(Arc::new(mysql));
    }

    let mailer = SmtpMailer::new(&config.smtp_host, config.smtp_port, config.smtp_timeout());
    let webhook = WebhookSender::new(config.webhook_timeout())
        .context("Failed to build webhook client")?;
    let mut notifier = Notifier::new(config.server_name.clone(), Arc::new(mailer), webhook);
    if let Some(sender) = &config.smtp_sender {
        notifier = notifier.with_sender(sender.clone());
    }
    let notifier = Arc::new(notifier);

    let mut builder = Pipeline::builder()
        .source(Arc::new(sampler))
        .store(store.clone())
        .notifier(notifier.clone())
        .retention_days(config.retention_days)
        .server_name(config.server_name.clone());
    if let Some(health) = health {
        builder = builder.health(health);
    }

    Ok(Components {
        store,
        notifier,
        pipeline: builder.build()?,
    })
}

async fn run_once(config: GuardianConfig, logger: &StructuredLogger) -> Result<()> {
    let components = build_components(&config, None).await?;

    let result = components.pipeline.run_tick().await;
    components.store.close().await;

    let report = result.context("Monitoring tick failed")?;
    if !report.notifications_ok() {
        info!(
            alerts = report.alerts.len(),
            "Tick completed with failed deliveries"
        );
    }

    logger.log_shutdown("tick complete");
    Ok(())
}

async fn serve(config: GuardianConfig, port: u16, logger: &StructuredLogger) -> Result<()> {
    let health_registry = HealthRegistry::with_all_components().await;
    let components = build_components(&config, Some(health_registry.clone())).await?;

    components
        .store
        .ping()
        .await
        .context("Metrics store is not reachable")?;

    let service = GuardianService::new(components.store.clone(), components.notifier.clone());
    let app_state = Arc::new(api::AppState::new(service, health_registry.clone()));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let tick_loop =
        TickLoop::new(Arc::new(components.pipeline)).with_health(health_registry.clone());
    let loop_handle = tokio::spawn(tick_loop.run(shutdown_rx));

    health_registry.set_ready(true).await;

    let mut api_handle = tokio::spawn(api::serve(port, app_state));

    // The API task only returns on failure
    let api_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            None
        }
        result = &mut api_handle => {
            logger.log_shutdown("API server stopped");
            Some(result)
        }
    };
    health_registry.set_ready(false).await;

    // Lets an in-flight tick finish before the store closes
    let _ = shutdown_tx.send(());
    let ticks = loop_handle.await.context("Monitoring loop panicked")?;
    api_handle.abort();
    components.store.close().await;
    info!(ticks = ticks, "Shut down");

    match api_result {
        None => Ok(()),
        Some(result) => {
            result.context("API server panicked")??;
            anyhow::bail!("API server exited unexpectedly")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();

    let config = GuardianConfig::load()?;
    info!(
        server_name = %config.server_name,
        db_path = %config.db_path.display(),
        "Guardian configured"
    );

    let logger = StructuredLogger::new(config.server_name.clone());

    match cli.command.unwrap_or(Command::Tick) {
        Command::Tick => {
            logger.log_startup(GUARDIAN_VERSION, "tick");
            run_once(config, &logger).await
        }
        Command::Serve { port } => {
            logger.log_startup(GUARDIAN_VERSION, "serve");
            let port = port.unwrap_or(config.api_port);
            serve(config, port, &logger).await
        }
    }
}
