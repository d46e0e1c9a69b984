//! Embedded single consumer for the processing queue.
//!
//! The [`Dispatcher`] wakes on a poll interval or when intake signals a new
//! admission, sweeps the queue, promotes the FIFO head and runs it through the
//! configured [`Analyzer`] before looking for the next job.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use super::scheduler::{window, MAX_WINDOW_SECS};
use super::{Job, JobId, ProcessingQueue, QueueError};
use crate::analysis::{Analyzer, ResultStore, UploadStaging};
use crate::error::TaxaError;

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Run the embedded dispatcher; disable to drive the queue over HTTP
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Poll interval for checking the queue (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Shutdown timeout (seconds)
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Worker name/identifier
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            name: default_name(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_name() -> String {
    "taxaformer-dispatcher".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Stats and Handle
// ═══════════════════════════════════════════════════════════════════════════════

/// Statistics for the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Total jobs processed
    pub processed: Arc<AtomicU64>,
    /// Total jobs succeeded
    pub succeeded: Arc<AtomicU64>,
    /// Total jobs failed, including execution timeouts
    pub failed: Arc<AtomicU64>,
    /// Currently running jobs (0 or 1)
    pub active: Arc<AtomicU64>,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }
}

/// Handle for controlling a running dispatcher.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    stats: WorkerStats,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the dispatcher to shut down gracefully.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Get dispatcher statistics.
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Signal shutdown and wait up to `timeout` for an in-flight job to finish.
    ///
    /// Returns `false` if the dispatcher had to be aborted.
    pub async fn stop(self, timeout: Duration) -> bool {
        self.shutdown();
        let abort = self.task.abort_handle();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(_) => true,
            Err(_) => {
                abort.abort();
                false
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Progress Reporter
// ═══════════════════════════════════════════════════════════════════════════════

/// Progress channel handed to the analyzer for one job.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    queue: Option<Arc<ProcessingQueue>>,
    job_id: JobId,
}

impl ProgressReporter {
    pub fn new(queue: Arc<ProcessingQueue>, job_id: JobId) -> Self {
        Self {
            queue: Some(queue),
            job_id,
        }
    }

    /// A reporter that drops every update.
    pub fn detached(job_id: JobId) -> Self {
        Self { queue: None, job_id }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Report progress; returns whether the queue accepted it.
    ///
    /// Updates for a job that no longer holds the slot are ignored.
    pub fn report(&self, percent: i64) -> bool {
        let Some(queue) = &self.queue else {
            return false;
        };
        match queue.report_progress(self.job_id, percent) {
            Ok(_) => true,
            Err(QueueError::StaleUpdate { job_id }) => {
                tracing::debug!(job_id = %job_id, percent = percent, "Ignoring stale progress update");
                false
            }
            Err(e) => {
                tracing::debug!(job_id = %self.job_id, error = %e, "Progress update rejected");
                false
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dispatcher
// ═══════════════════════════════════════════════════════════════════════════════

/// The single consumer that promotes and executes queued jobs.
pub struct Dispatcher {
    queue: Arc<ProcessingQueue>,
    analyzer: Arc<dyn Analyzer>,
    staging: UploadStaging,
    results: ResultStore,
    wake: Arc<Notify>,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<ProcessingQueue>,
        analyzer: Arc<dyn Analyzer>,
        staging: UploadStaging,
        results: ResultStore,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            analyzer,
            staging,
            results,
            wake: Arc::new(Notify::new()),
            config,
            stats: WorkerStats::new(),
        }
    }

    /// Share an existing wake-up signal with intake.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = wake;
        self
    }

    pub fn wake_handle(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// One dispatcher iteration: reclaim expired state, then promote and run
    /// at most one job. Returns the id of the job that was run.
    pub async fn tick(&self) -> Option<JobId> {
        let report = self.queue.sweep();
        for job_id in report
            .purged
            .iter()
            .chain(report.released.iter())
            .chain(report.expired.iter())
        {
            self.staging.discard(*job_id).await;
        }

        let retention = window(self.queue.config().retention_window_secs);
        let purged_results = self.results.purge_older_than(retention, Utc::now());
        if purged_results > 0 {
            tracing::debug!(count = purged_results, "Expired analysis results purged");
        }

        let job = self.queue.try_promote_next()?;
        let job_id = job.id;
        self.execute(job).await;
        Some(job_id)
    }

    async fn execute(&self, job: Job) {
        self.stats.active.fetch_add(1, Ordering::Relaxed);

        let input = self.staging.path_for(job.id);
        let progress = ProgressReporter::new(self.queue.clone(), job.id);
        let timeout_secs = self.queue.config().job_timeout_secs.min(MAX_WINDOW_SECS);

        let outcome = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.analyzer.analyze(&job, &input, &progress),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TaxaError::analysis_timeout(job.id, timeout_secs)),
        };

        let success = match outcome {
            Ok(report) => {
                // Stored before completion so a caller that sees `completed`
                // can fetch the report straight away.
                self.results.insert(job.id, report);
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(error) => {
                error.log();
                tracing::warn!(
                    worker = %self.config.name,
                    job_id = %job.id,
                    error = %error,
                    "Analysis failed"
                );
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        };

        if let Err(e) = self.queue.complete(job.id, success) {
            tracing::debug!(job_id = %job.id, error = %e, "Completion ignored");
        }

        self.staging.discard(job.id).await;
        self.stats.processed.fetch_add(1, Ordering::Relaxed);
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Start the dispatcher, returning a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let stats = self.stats.clone();

        let task = tokio::spawn(async move {
            let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

            tracing::info!(
                worker = %self.config.name,
                poll_interval_ms = self.config.poll_interval_ms,
                "Dispatcher started"
            );

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!(worker = %self.config.name, "Dispatcher shutting down");
                            break;
                        }
                    }
                    _ = self.wake.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                // A finished job never blocks promotion, so drain back to back.
                while self.tick().await.is_some() {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }

            tracing::info!(
                worker = %self.config.name,
                processed = self.stats.processed(),
                "Dispatcher stopped"
            );
        });

        WorkerHandle {
            shutdown: shutdown_tx,
            stats,
            task,
        }
    }
}
