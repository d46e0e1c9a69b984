//! Processing time and wait estimates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Job, JobState, JobStore};

/// Linear size-based duration model.
///
/// `estimate = base + max(0, size - free) / step`, all in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimator {
    /// Seconds charged for any job
    pub base_secs: u64,
    /// Bytes covered by the base charge
    pub free_bytes: u64,
    /// Bytes per additional second
    pub bytes_per_sec: u64,
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            base_secs: 30,
            free_bytes: 1024,
            bytes_per_sec: 100 * 1024,
        }
    }
}

impl Estimator {
    /// Estimated processing time for a payload of `payload_size` bytes.
    pub fn estimate(&self, payload_size: u64) -> u64 {
        let billable = payload_size.saturating_sub(self.free_bytes);
        self.base_secs + billable / self.bytes_per_sec.max(1)
    }

    /// Seconds the running job still needs, never negative.
    pub fn remaining_for(&self, job: &Job, now: DateTime<Utc>) -> u64 {
        if job.state != JobState::Running {
            return 0;
        }
        job.estimated_duration_secs
            .saturating_sub(job.elapsed_secs(now))
    }

    /// Wait for a caller at 1-indexed `position`.
    ///
    /// Remaining time of the running job plus the estimates of every queued
    /// job strictly ahead of `position`. Position 0 means "not queued".
    pub fn wait_for_position(
        &self,
        current: Option<&Job>,
        store: &JobStore,
        position: usize,
        now: DateTime<Utc>,
    ) -> u64 {
        if position == 0 {
            return 0;
        }
        let running = current.map_or(0, |job| self.remaining_for(job, now));
        let ahead: u64 = store
            .iter()
            .take(position - 1)
            .map(|job| job.estimated_duration_secs)
            .sum();
        running + ahead
    }

    /// Wait a newly admitted job would see at the tail of the queue.
    pub fn wait_for_new_job(
        &self,
        current: Option<&Job>,
        store: &JobStore,
        now: DateTime<Utc>,
    ) -> u64 {
        self.wait_for_position(current, store, store.len() + 1, now)
    }
}

/// Render seconds as the `"<m>m <s>s"` form shown to callers.
pub fn format_wait(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}
