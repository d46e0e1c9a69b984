//! Job commands: result retrieval, withdrawal and executor reports.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::analyze::{print_report_summary, StoredReport};
use super::configured_session;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum JobCommands {
    /// Fetch the report of a finished job
    Result {
        /// Job ID
        job_id: Uuid,

        /// Write the report to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Withdraw a job that is still waiting in the queue
    Cancel {
        /// Job ID
        job_id: Uuid,

        /// Session token used when submitting
        #[arg(short, long, env = "TAXAFORMER_SESSION")]
        session: Option<String>,
    },

    /// Report progress for the running job (external executor mode)
    Progress {
        /// Job ID
        job_id: Uuid,

        /// Percent complete
        #[arg(allow_hyphen_values = true)]
        percent: i64,
    },

    /// Report the outcome of the running job (external executor mode)
    Complete {
        /// Job ID
        job_id: Uuid,

        /// Mark the job as failed
        #[arg(long)]
        failed: bool,

        /// Report JSON file to store with the job
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct UpdateResponse {
    applied: bool,
    #[serde(default)]
    progress: Option<u8>,
}

#[derive(Debug, Deserialize, Serialize)]
struct WithdrawnJob {
    id: Uuid,
    filename: String,
}

fn print_update(what: &str, job_id: Uuid, update: &UpdateResponse, format: OutputFormat) {
    match format {
        OutputFormat::Table if update.applied => {
            let progress = update
                .progress
                .map(|p| format!(" ({}%)", p))
                .unwrap_or_default();
            output::print_success(&format!("{} recorded for job {}{}", what, job_id, progress));
        }
        OutputFormat::Table => {
            output::print_warning(&format!("Job {} is not running; {} ignored", job_id, what.to_lowercase()));
        }
        _ => output::print_item(update, format),
    }
}

pub async fn execute(cmd: JobCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        JobCommands::Result { job_id, save } => {
            let stored: StoredReport = client
                .get(&format!("/api/v1/jobs/{}/result", job_id))
                .await?;

            if let Some(path) = save {
                let content = serde_json::to_string_pretty(&stored.report)
                    .context("Failed to serialize report")?;
                tokio::fs::write(&path, content)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                output::print_success(&format!("Report saved to {}", path.display()));
            }

            match format {
                OutputFormat::Table => print_report_summary(&stored.report),
                _ => output::print_item(&stored, format),
            }
        }

        JobCommands::Cancel { job_id, session } => {
            let session = configured_session(session).unwrap_or_else(|| "anonymous".to_string());
            let withdrawn: WithdrawnJob = client
                .delete(&format!("/api/v1/jobs/{}", job_id), &[("session_id", session.as_str())])
                .await?;

            match format {
                OutputFormat::Table => output::print_success(&format!(
                    "Withdrew job {} ({})",
                    withdrawn.id, withdrawn.filename
                )),
                _ => output::print_item(&withdrawn, format),
            }
        }

        JobCommands::Progress { job_id, percent } => {
            let update: Option<UpdateResponse> = client
                .post(
                    &format!("/api/v1/jobs/{}/progress", job_id),
                    &serde_json::json!({ "percent": percent }),
                )
                .await?;
            let update = update.context("API returned success but no data")?;
            print_update("Progress", job_id, &update, format);
        }

        JobCommands::Complete {
            job_id,
            failed,
            report,
        } => {
            let result = match report {
                Some(path) => {
                    let content = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    Some(
                        serde_json::from_str::<serde_json::Value>(&content)
                            .with_context(|| format!("{} is not valid JSON", path.display()))?,
                    )
                }
                None => None,
            };

            let update: Option<UpdateResponse> = client
                .post(
                    &format!("/api/v1/jobs/{}/complete", job_id),
                    &serde_json::json!({ "success": !failed, "result": result }),
                )
                .await?;
            let update = update.context("API returned success but no data")?;
            print_update("Completion", job_id, &update, format);
        }
    }

    Ok(())
}
