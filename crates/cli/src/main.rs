//! Resource Guardian CLI
//!
//! Queries samples and alerts, manages alerting configuration and tests
//! notification channels through a guardian running in `serve` mode.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{alerts, metrics, settings};

/// Resource Guardian CLI
#[derive(Parser)]
#[command(name = "rgctl")]
#[command(author, version, about = "CLI for Resource Guardian", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RGCTL_API_URL or the config file)
    #[arg(long, env = "RGCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show guardian health and the latest sample
    Status,

    /// Show recorded samples
    Metrics {
        /// Window size in hours (1-720)
        #[arg(long, default_value_t = 24)]
        hours: i64,

        /// Show avg/min/max instead of individual samples
        #[arg(long)]
        average: bool,
    },

    /// List recent alerts, newest first
    Alerts {
        /// Maximum number of alerts (1-500)
        #[arg(long, short, default_value_t = 50)]
        limit: i64,

        /// Filter by alert type (cpu, ram, io, ...)
        #[arg(long = "type", short)]
        alert_type: Option<String>,

        /// Filter by severity (warning, critical, info)
        #[arg(long, short)]
        severity: Option<String>,
    },

    /// Show alert counts per type and severity
    Stats,

    /// Mark an alert as resolved
    Resolve {
        /// Alert ID
        id: i64,
    },

    /// Delete every alert
    Clear {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },

    /// Read or change alerting configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Send a test notification
    #[command(subcommand)]
    Test(TestCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show stored configuration
    Show,

    /// Store one or more KEY=VALUE pairs
    Set {
        #[arg(required = true, value_name = "KEY=VALUE")]
        pairs: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum TestCommands {
    /// Send a test email
    Email {
        /// Recipient address
        address: String,
    },

    /// Post a test alert to a webhook
    Webhook {
        /// Webhook URL (Slack, Discord, Teams or generic)
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = config::Config::load()?;
    let api_url = file_config.resolve_api_url(cli.api_url.as_deref());
    let format = cli
        .format
        .or_else(|| {
            file_config
                .default_format
                .as_deref()
                .and_then(|f| output::OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or_default();

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => metrics::show_status(&client, format).await?,
        Commands::Metrics { hours, average } => {
            metrics::show_metrics(&client, hours, average, format).await?
        }
        Commands::Alerts {
            limit,
            alert_type,
            severity,
        } => alerts::list_alerts(&client, limit, alert_type, severity, format).await?,
        Commands::Stats => alerts::show_stats(&client, format).await?,
        Commands::Resolve { id } => alerts::resolve_alert(&client, id, format).await?,
        Commands::Clear { yes } => alerts::clear_alerts(&client, yes, format).await?,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => settings::show_config(&client, format).await?,
            ConfigCommands::Set { pairs } => settings::set_config(&client, &pairs, format).await?,
        },
        Commands::Test(test_cmd) => match test_cmd {
            TestCommands::Email { address } => {
                settings::test_email(&client, &address, format).await?
            }
            TestCommands::Webhook { url } => settings::test_webhook(&client, &url, format).await?,
        },
    }

    Ok(())
}
