//! Status and metric history commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, Averages, HealthReport, Sample};
use crate::output::{
    color_status, color_usage, format_kb, format_optional_percent, format_timestamp, print_info,
    print_json, print_rows, print_warning, OutputFormat,
};

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "RAM")]
    ram: String,
    #[tabled(rename = "RAM Free")]
    ram_free: String,
    #[tabled(rename = "DB Conns")]
    connections: u64,
}

impl From<&Sample> for SampleRow {
    fn from(s: &Sample) -> Self {
        Self {
            time: format_timestamp(s.timestamp),
            cpu: color_usage(s.cpu_usage),
            ram: color_usage(s.ram_usage),
            ram_free: format!("{} / {}", format_kb(s.ram_free), format_kb(s.ram_total)),
            connections: s.database_connections,
        }
    }
}

#[derive(Tabled)]
struct AverageRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
}

/// Latest sample plus guardian health
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthReport = client.get_report("healthz").await?;
    let current: Option<Sample> = client.get_optional("api/v1/current").await?;

    if let OutputFormat::Json = format {
        return print_json(&serde_json::json!({ "health": health, "current": current }));
    }

    println!("Guardian: {}", color_status(&health.status));
    for (name, component) in &health.components {
        match &component.message {
            Some(message) => println!(
                "  {:<10} {} ({})",
                name,
                color_status(&component.status),
                message
            ),
            None => println!("  {:<10} {}", name, color_status(&component.status)),
        }
    }
    if let Some(ts) = health.last_tick {
        print_info(&format!("Last tick sampled at {}", format_timestamp(ts)));
    }
    println!();

    match current {
        Some(sample) => print_rows(vec![SampleRow::from(&sample)]),
        None => print_warning("No data available"),
    }

    Ok(())
}

/// Samples from the last `hours` hours, or their averages
pub async fn show_metrics(
    client: &ApiClient,
    hours: i64,
    average: bool,
    format: OutputFormat,
) -> Result<()> {
    if average {
        let averages: Averages = client
            .get(&format!("api/v1/metrics/average?hours={}", hours))
            .await?;

        return match format {
            OutputFormat::Json => print_json(&averages),
            OutputFormat::Table => {
                print_rows(vec![
                    AverageRow {
                        metric: "CPU",
                        avg: format_optional_percent(averages.avg_cpu),
                        min: format_optional_percent(averages.min_cpu),
                        max: format_optional_percent(averages.max_cpu),
                    },
                    AverageRow {
                        metric: "RAM",
                        avg: format_optional_percent(averages.avg_ram),
                        min: format_optional_percent(averages.min_ram),
                        max: format_optional_percent(averages.max_ram),
                    },
                ]);
                Ok(())
            }
        };
    }

    let samples: Vec<Sample> = client
        .get(&format!("api/v1/metrics?hours={}", hours))
        .await?;

    match format {
        OutputFormat::Json => print_json(&samples)?,
        OutputFormat::Table => {
            if samples.is_empty() {
                print_warning("No samples in this window");
                return Ok(());
            }

            print_rows(samples.iter().map(SampleRow::from).collect());
            println!("\nTotal: {} samples", samples.len());
        }
    }

    Ok(())
}
