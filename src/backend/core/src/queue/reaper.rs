//! Time-driven cleanup of queue state.
//!
//! Nothing here runs on a timer. The scheduler calls [`Reaper::sweep`] before
//! every admission, status read, stats read and promotion, and the dispatcher
//! calls it on every tick, so expiry is applied lazily but promptly.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::scheduler::{window, QueueState};
use super::{Job, JobId};

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Queued jobs dropped because they outlived the retention window
    pub purged: Vec<JobId>,
    /// Terminal job evicted from the processing slot
    pub released: Option<JobId>,
    /// Finished jobs whose grace window ran out
    pub expired: Vec<JobId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.purged.is_empty() && self.released.is_none() && self.expired.is_empty()
    }
}

/// Applies the grace and retention windows.
#[derive(Debug, Clone, Copy)]
pub struct Reaper {
    grace: Duration,
    retention: Duration,
}

impl Reaper {
    pub fn new(completion_grace_secs: u64, retention_window_secs: u64) -> Self {
        Self {
            grace: window(completion_grace_secs),
            retention: window(retention_window_secs),
        }
    }

    /// Whether a finished job has outlived its grace window (or, as a safety
    /// net, the retention window).
    pub fn is_expired(&self, job: &Job, now: DateTime<Utc>) -> bool {
        if !job.state.is_terminal() {
            return false;
        }
        match job.completed_at {
            Some(done) => now - done >= self.grace || done < now - self.retention,
            None => false,
        }
    }

    pub(crate) fn sweep(&self, state: &mut QueueState, now: DateTime<Utc>) -> SweepReport {
        let purged = state.store.purge_created_before(now - self.retention);

        // A running job is never removed by age; only the timeout check in
        // promotion can end it.
        let released = match &state.current {
            Some(job) if self.is_expired(job, now) => state.current.take().map(|job| job.id),
            _ => None,
        };

        let mut expired = Vec::new();
        state.recent.retain(|job| {
            if self.is_expired(job, now) {
                expired.push(job.id);
                false
            } else {
                true
            }
        });

        let report = SweepReport { purged, released, expired };
        if !report.is_empty() {
            tracing::debug!(
                purged = report.purged.len(),
                released = ?report.released,
                expired = report.expired.len(),
                "Queue sweep reclaimed jobs"
            );
        }
        report
    }
}
