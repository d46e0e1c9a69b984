//! File submission command.
//!
//! Uploads a sequence file, then optionally follows the job through the queue
//! until it finishes and saves the report.

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::Tabled;
use uuid::Uuid;

use super::{config, configured_session, QueueStatus};
use crate::client::ApiClient;
use crate::output::{self, format_secs, OutputFormat};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Sequence file (.fasta, .fa, .fastq, .fq, .txt)
    file: PathBuf,

    /// Session token identifying this submitter
    #[arg(short, long, env = "TAXAFORMER_SESSION")]
    session: Option<String>,

    /// Sample metadata as a JSON object
    #[arg(short, long)]
    metadata: Option<String>,

    /// Follow the job until it finishes
    #[arg(short, long)]
    wait: bool,

    /// Write the finished report to this path (implies --wait)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Seconds between status polls [default: 2]
    #[arg(long)]
    poll_interval: Option<u64>,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct AnalyzeResponse {
    job_id: Uuid,
    cached: bool,
    #[serde(default)]
    queue: Option<QueueStatus>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct StoredReport {
    pub job_id: Uuid,
    pub stored_at: String,
    pub report: serde_json::Value,
}

#[derive(Debug, Serialize, Tabled)]
struct GroupRow {
    #[tabled(rename = "Group")]
    name: String,
    #[tabled(rename = "Sequences")]
    value: u64,
}

pub async fn execute(args: AnalyzeArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .context("File path has no usable file name")?
        .to_string();
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    if let Some(metadata) = &args.metadata {
        serde_json::from_str::<serde_json::Value>(metadata).context("--metadata must be valid JSON")?;
    }

    // A fresh session per upload unless one is configured, so parallel
    // submissions from one machine are not rejected as duplicates.
    let session = configured_session(args.session.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let spinner = output::spinner(&format!("Uploading {}...", filename));
    let response: Result<AnalyzeResponse> = client
        .upload("/api/v1/analyze", &filename, bytes, &session, args.metadata.clone())
        .await;
    spinner.finish_and_clear();
    let response = response?;

    if response.cached {
        if let Some(report) = &response.result {
            if let Some(path) = &args.save {
                save_report(path, report).await?;
            }
            match format {
                OutputFormat::Table => {
                    output::print_info("Identical file already analysed; returning stored report");
                    print_report_summary(report);
                }
                _ => output::print_item(&response, format),
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => {
            output::print_success(&format!("Submitted {} as job {}", filename, response.job_id));
            output::print_detail("Session", &session);
            if let Some(status) = &response.queue {
                status.print_details();
            }
        }
        _ => output::print_item(&response, format),
    }

    if !(args.wait || args.save.is_some()) {
        return Ok(());
    }

    let poll_secs = args
        .poll_interval
        .or_else(|| config::load_value("poll-interval").and_then(|v| v.parse().ok()))
        .unwrap_or(2);
    let interval = Duration::from_secs(poll_secs.max(1));
    match follow(client, &session, response.job_id, interval).await? {
        QueueStatus::Completed { job_id, .. } => {
            let stored: StoredReport = client
                .get(&format!("/api/v1/jobs/{}/result", job_id))
                .await?;
            if let Some(path) = &args.save {
                save_report(path, &stored.report).await?;
            }
            match format {
                OutputFormat::Table => print_report_summary(&stored.report),
                _ => output::print_item(&stored, format),
            }
            Ok(())
        }
        other => anyhow::bail!("Job {} finished as {}", response.job_id, other.label()),
    }
}

/// Poll until the job reaches a terminal state.
async fn follow(client: &ApiClient, session: &str, job_id: Uuid, interval: Duration) -> Result<QueueStatus> {
    let pb = output::job_progress_bar("waiting");

    loop {
        let status: QueueStatus = match client
            .get_with_query("/api/v1/queue/status", &[("session_id", session)])
            .await
        {
            Ok(status) => status,
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };

        if status.job_id() != Some(job_id) {
            pb.abandon();
            anyhow::bail!("Job {} is no longer tracked by the server", job_id);
        }

        match &status {
            QueueStatus::Queued {
                position,
                estimated_wait,
                ..
            } => {
                pb.set_position(0);
                pb.set_message(format!("queued #{} (~{})", position, format_secs(*estimated_wait)));
            }
            QueueStatus::Processing {
                progress,
                estimated_remaining,
                ..
            } => {
                pb.set_position(u64::from(*progress));
                pb.set_message(format!("processing (~{} left)", format_secs(*estimated_remaining)));
            }
            QueueStatus::Completed { .. } => {
                pb.set_position(100);
                pb.finish_with_message("complete");
                return Ok(status);
            }
            QueueStatus::Failed { .. } | QueueStatus::NoJob { .. } => {
                pb.abandon_with_message("failed");
                return Ok(status);
            }
        }

        tokio::time::sleep(interval).await;
    }
}

async fn save_report(path: &Path, report: &serde_json::Value) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    output::print_success(&format!("Report saved to {}", path.display()));
    Ok(())
}

/// Print the metadata block and taxonomy summary of a report.
pub(crate) fn print_report_summary(report: &serde_json::Value) {
    let metadata = &report["metadata"];
    output::print_header("Analysis Report");
    for (label, key) in [
        ("Sample", "sampleName"),
        ("Sequences", "totalSequences"),
        ("Avg Confidence (%)", "avgConfidence"),
        ("Novel", "novelSequences"),
        ("Processing Time", "processingTime"),
    ] {
        let value = match &metadata[key] {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        output::print_detail(label, &value);
    }

    let rows: Vec<GroupRow> = report["taxonomy_summary"]
        .as_array()
        .map(|groups| {
            groups
                .iter()
                .map(|g| GroupRow {
                    name: g["name"].as_str().unwrap_or("?").to_string(),
                    value: g["value"].as_u64().unwrap_or(0),
                })
                .collect()
        })
        .unwrap_or_default();
    println!();
    output::print_list(&rows, OutputFormat::Table);
}
