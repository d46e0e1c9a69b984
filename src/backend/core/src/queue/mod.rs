//! Admission-controlled processing queue.
//!
//! This module serializes bursts of analysis submissions into one-at-a-time
//! execution:
//!
//! - **JobStore**: FIFO of queued jobs with a hard capacity
//! - **ProcessingQueue**: the scheduler owning the single processing slot
//! - **Estimator**: size-based duration and wait estimates
//! - **Reaper**: lazy grace-window and retention cleanup
//! - **Dispatcher**: the embedded consumer that promotes and executes jobs
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          ProcessingQueue                             │
//! │                                                                      │
//! │   admit ──▶ ┌──────────────┐  try_promote_next  ┌────────────────┐   │
//! │             │   JobStore   │ ─────────────────▶ │  current slot  │   │
//! │             │  (FIFO, max) │                    │ (Running/done) │   │
//! │             └──────────────┘                    └────────────────┘   │
//! │                    ▲                                    │            │
//! │                    │ sweep                              │ complete   │
//! │             ┌──────────────┐                            ▼            │
//! │             │    Reaper    │ ◀────────────── recent (grace window)   │
//! │             └──────────────┘                                         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use taxaformer_core::queue::{ProcessingQueue, QueueConfig};
//!
//! let queue = ProcessingQueue::new(QueueConfig::default());
//! let job = queue.admit("session-1", "sample.fasta", 4096)?;
//! if let Some(running) = queue.try_promote_next() {
//!     queue.report_progress(running.id, 50)?;
//!     queue.complete(running.id, true)?;
//! }
//! ```

pub mod estimator;
pub mod job;
pub mod reaper;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod worker;

pub use estimator::{format_wait, Estimator};
pub use job::{Job, JobId, JobState};
pub use reaper::{Reaper, SweepReport};
pub use scheduler::{ProcessingQueue, QueueConfig, MAX_WINDOW_SECS};
pub use status::{CurrentJobSummary, QueueStats, QueueStatusView};
pub use store::JobStore;
pub use worker::{Dispatcher, WorkerConfig, WorkerHandle, WorkerStats};

use thiserror::Error;

/// Rejections produced by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The caller already has a Queued or Running job.
    #[error("You already have a job in progress ({job_id}). Please wait for it to finish.")]
    DuplicateActiveJob { job_id: JobId },

    /// The FIFO is at capacity.
    #[error("Queue is full ({capacity} jobs waiting). Please try again later.")]
    QueueFull {
        capacity: usize,
        estimated_wait_secs: u64,
    },

    /// The job is not the current running job; the update was ignored.
    #[error("Job {job_id} is not the running job")]
    StaleUpdate { job_id: JobId },
}
