//! Health check command.
//!
//! Queries the `/health` endpoint and, optionally, the Prometheus exposition.

use anyhow::Result;
use clap::Args;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct HealthArgs {
    /// Also list the server's queue metrics
    #[arg(short, long)]
    detailed: bool,
}

/// Queue metric samples from a Prometheus text body.
fn queue_metric_lines(exposition: &str) -> Vec<&str> {
    exposition
        .lines()
        .filter(|line| line.starts_with("taxaformer_"))
        .collect()
}

pub async fn execute(args: HealthArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("Server Health");
            output::print_detail("Status", status);
            output::print_detail("API URL", client.base_url());

            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }
            if let Some(queued) = health.get("queue_length").and_then(|v| v.as_u64()) {
                output::print_detail("Queued Jobs", &queued.to_string());
            }
            if let Some(ts) = health.get("timestamp").and_then(|v| v.as_str()) {
                output::print_detail("Timestamp", ts);
            }

            if args.detailed {
                let exposition = client.get_text("/metrics").await?;
                let lines = queue_metric_lines(&exposition);
                output::print_header("Queue Metrics");
                if lines.is_empty() {
                    output::print_info("Metrics exporter is disabled or has no samples yet");
                }
                for line in lines {
                    println!("  {}", line);
                }
            }

            if status == "healthy" {
                output::print_success("Server is accepting uploads");
            } else {
                output::print_error(&format!("Server status: {}", status));
            }
        }
        _ => output::print_item(&health, format),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_metric_lines() {
        let body = "# HELP taxaformer_queue_depth Jobs waiting\n\
                    taxaformer_queue_depth 3\n\
                    process_cpu_seconds_total 1.5\n\
                    taxaformer_admissions_total 12\n";
        assert_eq!(
            queue_metric_lines(body),
            vec!["taxaformer_queue_depth 3", "taxaformer_admissions_total 12"]
        );
    }
}
