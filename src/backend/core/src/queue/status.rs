//! Caller-facing status snapshots.

use serde::{Deserialize, Serialize};

use super::{Job, JobId, JobState};
use super::estimator::format_wait;

/// What a caller sees when polling the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueStatusView {
    /// The caller has no job; shows the wait a new submission would get.
    NoJob {
        queue_length: usize,
        estimated_wait: u64,
    },
    /// The caller's job holds the processing slot.
    Processing {
        job_id: JobId,
        filename: String,
        progress: u8,
        estimated_remaining: u64,
    },
    /// The caller's job is waiting in the FIFO.
    Queued {
        job_id: JobId,
        filename: String,
        position: usize,
        queue_length: usize,
        estimated_wait: u64,
        message: String,
    },
    /// The caller's job finished and is still inside its grace window.
    Completed {
        job_id: JobId,
        filename: String,
        progress: u8,
    },
    /// The caller's job failed or timed out and is still inside its grace window.
    Failed {
        job_id: JobId,
        filename: String,
        progress: u8,
    },
}

impl QueueStatusView {
    pub(crate) fn queued(job: &Job, position: usize, queue_length: usize, estimated_wait: u64) -> Self {
        Self::Queued {
            job_id: job.id,
            filename: job.filename.clone(),
            position,
            queue_length,
            estimated_wait,
            message: format!(
                "Your file is #{} in queue. Estimated wait: {}",
                position,
                format_wait(estimated_wait)
            ),
        }
    }

    pub(crate) fn terminal(job: &Job) -> Option<Self> {
        let (job_id, filename, progress) = (job.id, job.filename.clone(), job.progress_percent);
        match job.state {
            JobState::Completed => Some(Self::Completed { job_id, filename, progress }),
            JobState::Failed => Some(Self::Failed { job_id, filename, progress }),
            JobState::Queued | JobState::Running => None,
        }
    }

    /// Job id, if the caller has one.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::NoJob { .. } => None,
            Self::Processing { job_id, .. }
            | Self::Queued { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => Some(*job_id),
        }
    }

    /// Status tag as serialized on the wire.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoJob { .. } => "no_job",
            Self::Processing { .. } => "processing",
            Self::Queued { .. } => "queued",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Summary of the job holding the processing slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentJobSummary {
    pub job_id: JobId,
    pub filename: String,
    pub state: JobState,
    pub progress: u8,
    pub elapsed_secs: u64,
}

/// Global queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Number of queued jobs
    pub queue_length: usize,
    /// Maximum number of queued jobs
    pub capacity: usize,
    /// Whether a job occupies the processing slot
    pub currently_processing: bool,
    /// The job in the slot, if any
    pub current_job: Option<CurrentJobSummary>,
    /// Wait a new submission would see
    pub estimated_wait_for_new_job: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_queued_message() {
        let job = Job::new("a", "reads.fastq", 0, 30, Utc::now());
        let view = QueueStatusView::queued(&job, 3, 4, 95);
        match &view {
            QueueStatusView::Queued { message, position, .. } => {
                assert_eq!(*position, 3);
                assert_eq!(message, "Your file is #3 in queue. Estimated wait: 1m 35s");
            }
            other => panic!("unexpected view: {:?}", other),
        }
        assert_eq!(view.job_id(), Some(job.id));
    }

    #[test]
    fn test_serialized_tag() {
        let view = QueueStatusView::NoJob {
            queue_length: 0,
            estimated_wait: 0,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "no_job");
        assert_eq!(json["queue_length"], 0);
        assert_eq!(view.label(), "no_job");
    }

    #[test]
    fn test_terminal_view() {
        let now = Utc::now();
        let mut job = Job::new("a", "a.fasta", 0, 30, now);
        assert!(QueueStatusView::terminal(&job).is_none());

        job.mark_running(now);
        job.mark_completed(now);
        let view = QueueStatusView::terminal(&job).unwrap();
        assert!(view.is_terminal());
        assert_eq!(
            view,
            QueueStatusView::Completed {
                job_id: job.id,
                filename: "a.fasta".into(),
                progress: 100
            }
        );
    }
}
