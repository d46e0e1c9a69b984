//! Job definitions.
//!
//! A [`Job`] is the only entity the queue tracks. Its lifecycle is strictly
//! monotonic:
//!
//! ```text
//! Queued ──▶ Running ──▶ Completed
//!                   └──▶ Failed
//! ```
//!
//! Each timestamp is stamped exactly once, at the transition that owns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// Job Identification
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique identifier for a job, assigned at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Create a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job State
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the FIFO for the processing slot
    Queued,
    /// Occupying the processing slot
    Running,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully, including forced timeouts
    Failed,
}

impl JobState {
    /// Check if the job has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Queued or Running jobs count against the one-job-per-caller rule.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Job
// ═══════════════════════════════════════════════════════════════════════════════

/// A unit of analysis work submitted by one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,
    /// Session token of the submitter
    pub caller: String,
    /// Original upload name, for display
    pub filename: String,
    /// Upload size in bytes, drives the duration estimate
    pub payload_size: u64,
    /// Current lifecycle state
    pub state: JobState,
    /// When the job was admitted
    pub created_at: DateTime<Utc>,
    /// When the job took the processing slot
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Estimated processing time, fixed at admission
    pub estimated_duration_secs: u64,
    /// Progress reported by the executor (0-100)
    pub progress_percent: u8,
}

impl Job {
    /// Create a freshly admitted job.
    pub fn new(
        caller: impl Into<String>,
        filename: impl Into<String>,
        payload_size: u64,
        estimated_duration_secs: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            caller: caller.into(),
            filename: filename.into(),
            payload_size,
            state: JobState::Queued,
            created_at: now,
            started_at: None,
            completed_at: None,
            estimated_duration_secs,
            progress_percent: 0,
        }
    }

    /// Move a queued job into the processing slot.
    ///
    /// Returns `false` and leaves the job untouched if it is not Queued.
    pub fn mark_running(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != JobState::Queued {
            return false;
        }
        self.state = JobState::Running;
        self.started_at = Some(now);
        true
    }

    /// Finish a running job successfully.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.state = JobState::Completed;
        self.completed_at = Some(now);
        self.progress_percent = 100;
        true
    }

    /// Finish a running job unsuccessfully, resetting progress.
    pub fn mark_failed(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.state = JobState::Failed;
        self.completed_at = Some(now);
        self.progress_percent = 0;
        true
    }

    /// Force a running job to Failed after it overran its timeout.
    ///
    /// Progress is kept at its last reported value.
    pub fn mark_timed_out(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.state = JobState::Failed;
        self.completed_at = Some(now);
        true
    }

    /// Overwrite progress, clamped to 0..=100. Only Running jobs accept progress.
    pub fn set_progress(&mut self, percent: i64) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.progress_percent = percent.clamp(0, 100) as u8;
        true
    }

    /// Whole seconds spent running, or 0 if the job has not started.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.started_at {
            Some(started) => (now - started).num_seconds().max(0) as u64,
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> Job {
        Job::new("session-a", "sample.fasta", 2048, 30, Utc::now())
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<JobId>().is_err());
    }

    #[test]
    fn test_job_state_flags() {
        assert!(JobState::Queued.is_active());
        assert!(JobState::Running.is_active());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert_eq!(JobState::Running.to_string(), "running");
    }

    #[test]
    fn test_job_lifecycle() {
        let now = Utc::now();
        let mut job = job();
        assert_eq!(job.state, JobState::Queued);
        assert!(job.started_at.is_none());

        assert!(job.mark_running(now));
        assert_eq!(job.started_at, Some(now));
        assert!(!job.mark_running(now + Duration::seconds(1)));
        assert_eq!(job.started_at, Some(now));

        assert!(job.set_progress(40));
        assert!(job.mark_completed(now + Duration::seconds(5)));
        assert_eq!(job.progress_percent, 100);
        assert_eq!(job.completed_at, Some(now + Duration::seconds(5)));

        // Terminal jobs never move again.
        assert!(!job.mark_failed(now + Duration::seconds(6)));
        assert!(!job.set_progress(10));
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn test_failure_resets_progress_but_timeout_keeps_it() {
        let now = Utc::now();
        let mut failed = job();
        failed.mark_running(now);
        failed.set_progress(60);
        failed.mark_failed(now);
        assert_eq!(failed.progress_percent, 0);

        let mut timed_out = job();
        timed_out.mark_running(now);
        timed_out.set_progress(60);
        timed_out.mark_timed_out(now);
        assert_eq!(timed_out.state, JobState::Failed);
        assert_eq!(timed_out.progress_percent, 60);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut job = job();
        assert!(!job.set_progress(50));
        job.mark_running(Utc::now());
        job.set_progress(150);
        assert_eq!(job.progress_percent, 100);
        job.set_progress(-5);
        assert_eq!(job.progress_percent, 0);
    }

    #[test]
    fn test_elapsed_secs() {
        let now = Utc::now();
        let mut job = job();
        assert_eq!(job.elapsed_secs(now), 0);
        job.mark_running(now);
        assert_eq!(job.elapsed_secs(now + Duration::seconds(42)), 42);
    }
}
