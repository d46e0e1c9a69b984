#![allow(clippy::result_large_err)]
//! # Taxaformer Core
//!
//! Admission-controlled processing queue for DNA sequence analysis.
//!
//! ## Architecture
//!
//! - **Queue**: Single-consumer FIFO with per-caller admission, timeouts and
//!   a grace window for finished jobs
//! - **Analysis**: Sequence parsing, classification and result storage
//! - **API**: Multipart intake, status views and executor endpoints
//! - **Telemetry**: Structured logging and Prometheus metrics

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod queue;
pub mod telemetry;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, TaxaError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisReport, Analyzer, MockClassifier, ResultStore, StoredReport, UploadStaging,
    };
    pub use crate::config::Config;
    pub use crate::error::{ErrorCode, ErrorContext, Result, TaxaError};
    pub use crate::queue::{
        Dispatcher, Estimator, Job, JobId, JobState, ProcessingQueue, QueueConfig, QueueError,
        QueueStats, QueueStatusView, WorkerConfig, WorkerHandle,
    };
}
