//! In-memory store of finished analysis reports.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AnalysisReport;
use crate::queue::JobId;

/// A report together with when it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    pub job_id: JobId,
    pub stored_at: DateTime<Utc>,
    pub report: AnalysisReport,
}

/// Reports keyed by job id, shared by the dispatcher and the API.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    reports: Arc<DashMap<JobId, StoredReport>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job_id: JobId, report: AnalysisReport) {
        self.insert_at(job_id, report, Utc::now());
    }

    pub fn insert_at(&self, job_id: JobId, report: AnalysisReport, now: DateTime<Utc>) {
        self.reports.insert(
            job_id,
            StoredReport {
                job_id,
                stored_at: now,
                report,
            },
        );
    }

    pub fn get(&self, job_id: JobId) -> Option<StoredReport> {
        self.reports.get(&job_id).map(|entry| entry.value().clone())
    }

    /// Most recent report for an upload with the given SHA-256.
    pub fn find_by_hash(&self, file_sha256: &str) -> Option<StoredReport> {
        self.reports
            .iter()
            .filter(|entry| entry.report.metadata.file_sha256 == file_sha256)
            .max_by_key(|entry| entry.stored_at)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Drop reports older than `max_age`, returning how many were removed.
    pub fn purge_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        let before = self.reports.len();
        self.reports.retain(|_, stored| stored.stored_at >= cutoff);
        before.saturating_sub(self.reports.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisMetadata;

    fn report(sha: &str) -> AnalysisReport {
        AnalysisReport {
            metadata: AnalysisMetadata {
                sample_name: "s.fasta".into(),
                total_sequences: 1,
                avg_confidence: 90,
                novel_sequences: 0,
                processing_time: "0.01s".into(),
                file_sha256: sha.into(),
            },
            taxonomy_summary: Vec::new(),
            sequences: Vec::new(),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = ResultStore::new();
        let job_id = JobId::new();
        store.insert(job_id, report("abc"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(job_id).map(|r| r.job_id), Some(job_id));
        assert!(store.get(JobId::new()).is_none());
        assert_eq!(store.find_by_hash("abc").map(|r| r.job_id), Some(job_id));
        assert!(store.find_by_hash("def").is_none());
    }

    #[test]
    fn test_purge_older_than() {
        let store = ResultStore::new();
        let now = Utc::now();
        let old = JobId::new();
        let fresh = JobId::new();
        store.insert_at(old, report("a"), now - Duration::hours(2));
        store.insert_at(fresh, report("b"), now);

        assert_eq!(store.purge_older_than(Duration::hours(1), now), 1);
        assert!(store.get(old).is_none());
        assert!(store.get(fresh).is_some());
    }
}
