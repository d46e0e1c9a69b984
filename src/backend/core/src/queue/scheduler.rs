//! The single-slot processing queue.
//!
//! [`ProcessingQueue`] owns every piece of queue state behind one
//! `parking_lot::Mutex`. Critical sections are short and never await, so the
//! queue can be shared by request handlers and the dispatcher through an
//! `Arc` without an async lock.
//!
//! Every time-dependent operation has an `*_at` form that takes the clock
//! reading explicitly; the plain form reads `Utc::now()`.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::estimator::Estimator;
use super::reaper::{Reaper, SweepReport};
use super::status::{CurrentJobSummary, QueueStats, QueueStatusView};
use super::{Job, JobId, JobState, JobStore, QueueError};
use crate::telemetry::metrics::QueueMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Queue limits and windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of queued (not running) jobs
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Seconds a job may run before it is forced to Failed
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Seconds a finished job stays visible to its caller
    #[serde(default = "default_completion_grace_secs")]
    pub completion_grace_secs: u64,

    /// Seconds after which abandoned jobs are reclaimed
    #[serde(default = "default_retention_window_secs")]
    pub retention_window_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            job_timeout_secs: default_job_timeout_secs(),
            completion_grace_secs: default_completion_grace_secs(),
            retention_window_secs: default_retention_window_secs(),
        }
    }
}

/// Upper bound for every queue window: ten years.
pub const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A window in seconds as a `Duration`, saturating at [`MAX_WINDOW_SECS`].
pub(crate) fn window(secs: u64) -> Duration {
    i64::try_from(secs.min(MAX_WINDOW_SECS))
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or_else(|| Duration::days(10 * 365))
}

fn default_max_queue_size() -> usize {
    10
}

fn default_job_timeout_secs() -> u64 {
    300
}

fn default_completion_grace_secs() -> u64 {
    30
}

fn default_retention_window_secs() -> u64 {
    3600
}

// ═══════════════════════════════════════════════════════════════════════════════
// State
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything guarded by the queue lock.
#[derive(Debug)]
pub(crate) struct QueueState {
    /// Queued jobs in admission order
    pub(crate) store: JobStore,
    /// The processing slot: a Running job, or a finished one awaiting release
    pub(crate) current: Option<Job>,
    /// Finished jobs moved out of the slot but still inside their grace window
    pub(crate) recent: Vec<Job>,
}

impl QueueState {
    fn running(&self) -> Option<&Job> {
        self.current
            .as_ref()
            .filter(|job| job.state == JobState::Running)
    }

    fn running_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.current
            .as_mut()
            .filter(|job| job.id == job_id && job.state == JobState::Running)
    }

    fn find_active(&self, caller: &str) -> Option<&Job> {
        self.running()
            .filter(|job| job.caller == caller)
            .or_else(|| self.store.find_active(caller))
    }

    /// Most recently finished job for `caller` that is still visible.
    fn find_terminal(&self, caller: &str) -> Option<&Job> {
        self.current
            .iter()
            .chain(self.recent.iter().rev())
            .filter(|job| job.caller == caller && job.state.is_terminal())
            .max_by_key(|job| job.completed_at)
    }

    fn set_aside_current(&mut self) {
        if let Some(job) = self.current.take() {
            self.recent.push(job);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Processing Queue
// ═══════════════════════════════════════════════════════════════════════════════

/// Admission-controlled FIFO feeding a single processing slot.
#[derive(Debug)]
pub struct ProcessingQueue {
    state: Mutex<QueueState>,
    config: QueueConfig,
    job_timeout: Duration,
    estimator: Estimator,
    reaper: Reaper,
}

impl ProcessingQueue {
    /// Create a queue with the default estimator.
    pub fn new(config: QueueConfig) -> Self {
        Self::with_estimator(config, Estimator::default())
    }

    pub fn with_estimator(config: QueueConfig, estimator: Estimator) -> Self {
        let reaper = Reaper::new(config.completion_grace_secs, config.retention_window_secs);
        Self {
            state: Mutex::new(QueueState {
                store: JobStore::new(config.max_queue_size),
                current: None,
                recent: Vec::new(),
            }),
            job_timeout: window(config.job_timeout_secs),
            config,
            estimator,
            reaper,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admission
    // ─────────────────────────────────────────────────────────────────────────

    /// Admit a new job for `caller`.
    pub fn admit(
        &self,
        caller: &str,
        filename: &str,
        payload_size: u64,
    ) -> Result<Job, QueueError> {
        self.admit_at(caller, filename, payload_size, Utc::now())
    }

    /// Admit a new job for `caller` at `now`.
    ///
    /// The job is appended Queued; promotion is left to the consumer.
    pub fn admit_at(
        &self,
        caller: &str,
        filename: &str,
        payload_size: u64,
        now: DateTime<Utc>,
    ) -> Result<Job, QueueError> {
        self.admit_with_id_at(JobId::new(), caller, filename, payload_size, now)
    }

    /// Admit under an id reserved by the caller, so the job's input can be
    /// staged before the job becomes visible to the consumer.
    pub fn admit_with_id(
        &self,
        job_id: JobId,
        caller: &str,
        filename: &str,
        payload_size: u64,
    ) -> Result<Job, QueueError> {
        self.admit_with_id_at(job_id, caller, filename, payload_size, Utc::now())
    }

    pub fn admit_with_id_at(
        &self,
        job_id: JobId,
        caller: &str,
        filename: &str,
        payload_size: u64,
        now: DateTime<Utc>,
    ) -> Result<Job, QueueError> {
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        if let Some(existing) = state.find_active(caller) {
            QueueMetrics::rejected("duplicate");
            debug!(caller = %caller, job_id = %existing.id, "Rejected duplicate submission");
            return Err(QueueError::DuplicateActiveJob {
                job_id: existing.id,
            });
        }

        let estimated_wait = self
            .estimator
            .wait_for_new_job(state.current.as_ref(), &state.store, now);
        let estimate = self.estimator.estimate(payload_size);
        let mut job = Job::new(caller, filename, payload_size, estimate, now);
        job.id = job_id;
        let snapshot = job.clone();

        if let Err(err) = state.store.append(job, estimated_wait) {
            QueueMetrics::rejected("full");
            warn!(
                caller = %caller,
                capacity = state.store.capacity(),
                "Rejected submission, queue is full"
            );
            return Err(err);
        }

        let position = state.store.len();
        QueueMetrics::admitted();
        QueueMetrics::set_depth(position);
        info!(
            job_id = %snapshot.id,
            caller = %caller,
            filename = %filename,
            payload_size = payload_size,
            position = position,
            estimated_secs = estimate,
            "Job admitted"
        );

        Ok(snapshot)
    }

    /// Remove a job that is still Queued. A running or finished job is left
    /// alone.
    pub fn withdraw(&self, job_id: JobId) -> Option<Job> {
        let mut state = self.state.lock();
        let removed = state.store.remove(job_id);
        if removed.is_some() {
            QueueMetrics::set_depth(state.store.len());
            info!(job_id = %job_id, "Job withdrawn from queue");
        }
        removed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Promotion
    // ─────────────────────────────────────────────────────────────────────────

    /// Move the FIFO head into the processing slot if the slot is free.
    pub fn try_promote_next(&self) -> Option<Job> {
        self.try_promote_next_at(Utc::now())
    }

    /// Move the FIFO head into the processing slot at `now`.
    ///
    /// A running job that has overrun `job_timeout_secs` is forced to Failed
    /// first, so the same call can promote its successor. A finished job in
    /// the slot never blocks promotion.
    pub fn try_promote_next_at(&self, now: DateTime<Utc>) -> Option<Job> {
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        let timeout = self.job_timeout;
        if let Some(job) = state.current.as_mut() {
            if job.state == JobState::Running {
                let overran = job
                    .started_at
                    .map_or(false, |started| now - started > timeout);
                if !overran {
                    return None;
                }
                job.mark_timed_out(now);
                QueueMetrics::timed_out();
                warn!(
                    job_id = %job.id,
                    caller = %job.caller,
                    timeout_secs = self.config.job_timeout_secs,
                    "Job exceeded timeout, marked failed"
                );
            }
            state.set_aside_current();
        }

        let mut next = state.store.pop_front()?;
        next.mark_running(now);
        let snapshot = next.clone();
        state.current = Some(next);

        let waited = (now - snapshot.created_at).num_milliseconds().max(0) as f64 / 1000.0;
        QueueMetrics::promoted(waited);
        QueueMetrics::set_depth(state.store.len());
        info!(
            job_id = %snapshot.id,
            caller = %snapshot.caller,
            filename = %snapshot.filename,
            waited_secs = waited,
            "Job promoted to processing"
        );

        Some(snapshot)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Executor Reports
    // ─────────────────────────────────────────────────────────────────────────

    /// Record progress for the running job. Returns the clamped value.
    pub fn report_progress(&self, job_id: JobId, percent: i64) -> Result<u8, QueueError> {
        let mut state = self.state.lock();
        let job = state
            .running_mut(job_id)
            .ok_or(QueueError::StaleUpdate { job_id })?;
        job.set_progress(percent);
        debug!(job_id = %job_id, progress = job.progress_percent, "Progress updated");
        Ok(job.progress_percent)
    }

    /// Finish the running job.
    pub fn complete(&self, job_id: JobId, success: bool) -> Result<Job, QueueError> {
        self.complete_at(job_id, success, Utc::now())
    }

    /// Finish the running job at `now`.
    ///
    /// The job keeps the slot until its grace window elapses, so its caller
    /// can observe the outcome.
    pub fn complete_at(
        &self,
        job_id: JobId,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<Job, QueueError> {
        let mut state = self.state.lock();
        let job = state
            .running_mut(job_id)
            .ok_or(QueueError::StaleUpdate { job_id })?;

        if success {
            job.mark_completed(now);
        } else {
            job.mark_failed(now);
        }

        let ran = job.elapsed_secs(now);
        QueueMetrics::completed(success, ran as f64);
        info!(
            job_id = %job.id,
            caller = %job.caller,
            success = success,
            run_secs = ran,
            "Job finished"
        );

        Ok(job.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Status of `caller`'s job as seen right now.
    pub fn status_for(&self, caller: &str) -> QueueStatusView {
        self.status_for_at(caller, Utc::now())
    }

    /// Status of `caller`'s job at `now`.
    ///
    /// An active job takes precedence over a finished one still in its grace
    /// window.
    pub fn status_for_at(&self, caller: &str, now: DateTime<Utc>) -> QueueStatusView {
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        if let Some(job) = state.running().filter(|job| job.caller == caller) {
            return QueueStatusView::Processing {
                job_id: job.id,
                filename: job.filename.clone(),
                progress: job.progress_percent,
                estimated_remaining: self.estimator.remaining_for(job, now),
            };
        }

        if let Some(job) = state.store.find_active(caller) {
            let position = state.store.position_of(job.id);
            let wait = self.estimator.wait_for_position(
                state.current.as_ref(),
                &state.store,
                position,
                now,
            );
            return QueueStatusView::queued(job, position, state.store.len(), wait);
        }

        if let Some(view) = state.find_terminal(caller).and_then(QueueStatusView::terminal) {
            return view;
        }

        QueueStatusView::NoJob {
            queue_length: state.store.len(),
            estimated_wait: self
                .estimator
                .wait_for_new_job(state.current.as_ref(), &state.store, now),
        }
    }

    /// Global queue snapshot.
    pub fn stats(&self) -> QueueStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> QueueStats {
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now);

        let current_job = state.current.as_ref().map(|job| CurrentJobSummary {
            job_id: job.id,
            filename: job.filename.clone(),
            state: job.state,
            progress: job.progress_percent,
            elapsed_secs: job.elapsed_secs(now),
        });

        QueueStats {
            queue_length: state.store.len(),
            capacity: state.store.capacity(),
            currently_processing: state.current.is_some(),
            current_job,
            estimated_wait_for_new_job: self
                .estimator
                .wait_for_new_job(state.current.as_ref(), &state.store, now),
        }
    }

    /// The Queued or Running job owned by `caller`.
    pub fn find_active_job(&self, caller: &str) -> Option<Job> {
        self.state.lock().find_active(caller).cloned()
    }

    /// 1-indexed queue position, 0 if the job is not queued.
    pub fn position_of(&self, job_id: JobId) -> usize {
        self.state.lock().store.position_of(job_id)
    }

    /// Number of queued jobs.
    pub fn queue_len(&self) -> usize {
        self.state.lock().store.len()
    }

    /// Snapshot of whatever occupies the processing slot.
    pub fn current_job(&self) -> Option<Job> {
        self.state.lock().current.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cleanup
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply the grace and retention windows.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut state = self.state.lock();
        self.sweep_locked(&mut state, now)
    }

    fn sweep_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> SweepReport {
        let report = self.reaper.sweep(state, now);
        if !report.purged.is_empty() {
            QueueMetrics::purged(report.purged.len());
            QueueMetrics::set_depth(state.store.len());
            for job_id in &report.purged {
                info!(job_id = %job_id, "Abandoned job purged from queue");
            }
        }
        report
    }
}

impl Default for ProcessingQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
