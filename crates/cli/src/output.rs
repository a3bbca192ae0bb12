//! Output formatting utilities

use chrono::{Local, TimeZone};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print any response as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows as a rounded table
pub fn print_rows<R: tabled::Tabled>(rows: Vec<R>) {
    let table = tabled::Table::new(rows)
        .with(tabled::settings::Style::rounded())
        .to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Epoch seconds as local `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// `None` averages mean the window had no samples
pub fn format_optional_percent(value: Option<f64>) -> String {
    value.map(format_percent).unwrap_or_else(|| "-".to_string())
}

/// Format kilobytes as a human-readable string
pub fn format_kb(kb: u64) -> String {
    const MB: u64 = 1024;
    const GB: u64 = MB * 1024;

    if kb >= GB {
        format!("{:.2}Gi", kb as f64 / GB as f64)
    } else if kb >= MB {
        format!("{:.2}Mi", kb as f64 / MB as f64)
    } else {
        format!("{}Ki", kb)
    }
}

/// Color a usage percentage against the stock 70/85 thresholds
pub fn color_usage(value: f64) -> String {
    let formatted = format_percent(value);
    if value >= 85.0 {
        formatted.red().to_string()
    } else if value >= 70.0 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

pub fn color_severity(severity: &str) -> String {
    match severity.to_lowercase().as_str() {
        "critical" => severity.red().bold().to_string(),
        "warning" => severity.yellow().to_string(),
        "info" => severity.blue().to_string(),
        _ => severity.to_string(),
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "resolved" | "success" => status.green().to_string(),
        "degraded" | "open" => status.yellow().to_string(),
        "unhealthy" | "error" => status.red().to_string(),
        _ => status.to_string(),
    }
}
