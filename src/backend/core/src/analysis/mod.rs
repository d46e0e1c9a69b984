//! Sequence analysis executed for each promoted job.
//!
//! - **Analyzer**: the executor seam driven by the dispatcher
//! - **fasta**: FASTA/FASTQ parsing
//! - **MockClassifier**: deterministic stand-in for a taxonomic classifier
//! - **UploadStaging**: per-job upload files on disk
//! - **ResultStore**: finished reports awaiting pickup

pub mod classifier;
pub mod fasta;
pub mod results;
pub mod staging;

pub use classifier::MockClassifier;
pub use fasta::{parse_sequences, ParsedSequence};
pub use results::{ResultStore, StoredReport};
pub use staging::UploadStaging;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::queue::worker::ProgressReporter;
use crate::queue::Job;

/// Classification of one input sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub accession: String,
    /// Semicolon-separated lineage, root first
    pub taxonomy: String,
    pub length: usize,
    /// Classification confidence in 0.75..=0.99
    pub confidence: f64,
    /// Database overlap percentage in 70..=99
    pub overlap: u8,
    pub cluster: String,
    /// Novelty score in 0.05..=0.25
    pub novelty_score: f64,
    /// "POTENTIALLY NOVEL" or "Known"
    pub status: String,
}

/// Count of sequences in one major group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyGroup {
    pub name: String,
    pub value: usize,
    pub color: String,
}

/// Summary statistics for one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub sample_name: String,
    pub total_sequences: usize,
    /// Mean confidence as a whole percentage
    pub avg_confidence: u8,
    pub novel_sequences: usize,
    pub processing_time: String,
    /// Hex SHA-256 of the uploaded file
    pub file_sha256: String,
}

/// Full result of analysing one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub taxonomy_summary: Vec<TaxonomyGroup>,
    pub sequences: Vec<SequenceRecord>,
}

/// Executes the work for a promoted job.
///
/// Implementations report progress through `progress` and return the report;
/// the dispatcher calls `complete` on the queue based on the outcome.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        job: &Job,
        input: &Path,
        progress: &ProgressReporter,
    ) -> Result<AnalysisReport>;
}
