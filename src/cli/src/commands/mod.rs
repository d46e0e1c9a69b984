//! CLI command implementations.

pub mod analyze;
pub mod config;
pub mod health;
pub mod job;
pub mod queue;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::output::{self, format_secs};

// ── API types ───────────────────────────────────────────────────────────────

/// Caller status as returned by `/api/v1/queue/status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueStatus {
    NoJob {
        queue_length: usize,
        estimated_wait: u64,
    },
    Processing {
        job_id: Uuid,
        filename: String,
        progress: u8,
        estimated_remaining: u64,
    },
    Queued {
        job_id: Uuid,
        filename: String,
        position: usize,
        queue_length: usize,
        estimated_wait: u64,
        message: String,
    },
    Completed {
        job_id: Uuid,
        filename: String,
        progress: u8,
    },
    Failed {
        job_id: Uuid,
        filename: String,
        progress: u8,
    },
}

impl QueueStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoJob { .. } => "no job",
            Self::Processing { .. } => "processing",
            Self::Queued { .. } => "queued",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::NoJob { .. } => None,
            Self::Processing { job_id, .. }
            | Self::Queued { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => Some(*job_id),
        }
    }

    /// Print as labelled details.
    pub fn print_details(&self) {
        output::print_detail("Status", self.label());
        match self {
            Self::NoJob {
                queue_length,
                estimated_wait,
            } => {
                output::print_detail("Queue Length", &queue_length.to_string());
                output::print_detail("Wait If Submitted", &format_secs(*estimated_wait));
            }
            Self::Processing {
                job_id,
                filename,
                progress,
                estimated_remaining,
            } => {
                output::print_detail("Job", &job_id.to_string());
                output::print_detail("File", filename);
                output::print_detail("Progress", &format!("{}%", progress));
                output::print_detail("Remaining", &format_secs(*estimated_remaining));
            }
            Self::Queued {
                job_id,
                filename,
                position,
                queue_length,
                message,
                ..
            } => {
                output::print_detail("Job", &job_id.to_string());
                output::print_detail("File", filename);
                output::print_detail("Position", &format!("{} of {}", position, queue_length));
                output::print_detail("Message", message);
            }
            Self::Completed {
                job_id, filename, ..
            }
            | Self::Failed {
                job_id, filename, ..
            } => {
                output::print_detail("Job", &job_id.to_string());
                output::print_detail("File", filename);
            }
        }
    }
}

/// Session from the flag or environment, then the settings file.
pub fn configured_session(explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|s| !s.trim().is_empty())
        .or_else(|| config::load_value("session"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_status_parse() {
        let status: QueueStatus = serde_json::from_value(serde_json::json!({
            "status": "queued",
            "job_id": "7d3c1f0e-4c55-4a57-9a43-2f3f0f6e1a10",
            "filename": "a.fasta",
            "position": 2,
            "queue_length": 3,
            "estimated_wait": 65,
            "message": "Your file is #2 in queue. Estimated wait: 1m 5s"
        }))
        .unwrap();
        assert_eq!(status.label(), "queued");
        assert!(status.job_id().is_some());
    }
}
