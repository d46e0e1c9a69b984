//! Queue inspection commands.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{configured_session, QueueStatus};
use crate::client::ApiClient;
use crate::output::{self, format_secs, OutputFormat};

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Show the status of a session's job
    Status {
        /// Session token used when submitting
        #[arg(short, long, env = "TAXAFORMER_SESSION")]
        session: Option<String>,
    },

    /// Show global queue statistics
    Stats,

    /// Promote the next queued job (external executor mode)
    Promote,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize)]
struct CurrentJob {
    job_id: Uuid,
    filename: String,
    state: String,
    progress: u8,
    elapsed_secs: u64,
}

#[derive(Debug, Deserialize, Serialize)]
struct QueueStats {
    queue_length: usize,
    capacity: usize,
    currently_processing: bool,
    current_job: Option<CurrentJob>,
    estimated_wait_for_new_job: u64,
}

#[derive(Debug, Deserialize, Serialize)]
struct PromotedJob {
    id: Uuid,
    caller: String,
    filename: String,
    state: String,
}

pub async fn execute(cmd: QueueCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        QueueCommands::Status { session } => {
            let session = configured_session(session).unwrap_or_else(|| "anonymous".to_string());
            let status: QueueStatus = client
                .get_with_query("/api/v1/queue/status", &[("session_id", session.as_str())])
                .await?;

            match format {
                OutputFormat::Table => {
                    output::print_header("Queue Status");
                    output::print_detail("Session", &session);
                    status.print_details();
                }
                _ => output::print_item(&status, format),
            }
        }

        QueueCommands::Stats => {
            let stats: QueueStats = client.get("/api/v1/queue/stats").await?;

            match format {
                OutputFormat::Table => {
                    output::print_header("Queue Statistics");
                    output::print_detail(
                        "Queued",
                        &format!("{} / {}", stats.queue_length, stats.capacity),
                    );
                    output::print_detail(
                        "Wait For New Job",
                        &format_secs(stats.estimated_wait_for_new_job),
                    );
                    match &stats.current_job {
                        Some(job) => {
                            output::print_detail("Current Job", &job.job_id.to_string());
                            output::print_detail("  File", &job.filename);
                            output::print_detail("  State", &job.state);
                            output::print_detail("  Progress", &format!("{}%", job.progress));
                            output::print_detail("  Elapsed", &format_secs(job.elapsed_secs));
                        }
                        None => output::print_detail("Current Job", "idle"),
                    }
                }
                _ => output::print_item(&stats, format),
            }
        }

        QueueCommands::Promote => {
            let promoted: Option<PromotedJob> = client
                .post("/api/v1/queue/promote", &serde_json::json!({}))
                .await?;

            match (promoted, format) {
                (Some(job), OutputFormat::Table) => {
                    output::print_success(&format!("Promoted job {}", job.id));
                    output::print_detail("Session", &job.caller);
                    output::print_detail("File", &job.filename);
                }
                (None, OutputFormat::Table) => {
                    output::print_info("Nothing promoted: slot busy or queue empty");
                }
                (promoted, _) => output::print_item(&promoted, format),
            }
        }
    }

    Ok(())
}
