//! On-disk staging of uploads between admission and execution.

use std::path::{Path, PathBuf};

use crate::error::{ErrorContext, Result, TaxaError};
use crate::queue::JobId;

/// Directory holding one `<job_id>.upload` file per pending job.
#[derive(Debug, Clone)]
pub struct UploadStaging {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl UploadStaging {
    /// Create the staging directory if needed.
    pub async fn new(dir: impl Into<PathBuf>, allowed_extensions: Vec<String>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .context(format!("Failed to create upload directory {}", dir.display()))?;
        Ok(Self {
            dir,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Reject filenames whose extension is not allowed.
    pub fn check_extension(&self, filename: &str) -> Result<()> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()));

        match extension {
            Some(ext) if self.allowed_extensions.contains(&ext) => Ok(()),
            _ => Err(TaxaError::unsupported_file_type(filename, &self.allowed_extensions)),
        }
    }

    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.dir.join(format!("{}.upload", job_id))
    }

    /// Write the upload for `job_id`.
    pub async fn stage(&self, job_id: JobId, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(job_id);
        tokio::fs::write(&path, bytes)
            .await
            .context(format!("Failed to stage upload for job {}", job_id))?;
        tracing::debug!(job_id = %job_id, bytes = bytes.len(), path = %path.display(), "Upload staged");
        Ok(path)
    }

    /// Remove the staged upload. A missing file is not an error.
    pub async fn discard(&self, job_id: JobId) {
        let path = self.path_for(job_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(job_id = %job_id, "Staged upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Failed to remove staged upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn extensions() -> Vec<String> {
        [".fasta", ".fa", ".fastq", ".fq", ".txt"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_check_extension() {
        let dir = tempfile::tempdir().unwrap();
        let staging = UploadStaging::new(dir.path(), extensions()).await.unwrap();

        assert!(staging.check_extension("reads.fastq").is_ok());
        assert!(staging.check_extension("SAMPLE.FASTA").is_ok());
        assert!(staging.check_extension("notes.txt").is_ok());

        let err = staging.check_extension("report.pdf").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedFileType);
        assert!(staging.check_extension("no_extension").is_err());
    }

    #[tokio::test]
    async fn test_stage_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let staging = UploadStaging::new(dir.path().join("uploads"), extensions())
            .await
            .unwrap();
        let job_id = JobId::new();

        let path = staging.stage(job_id, b">a\nACGT\n").await.unwrap();
        assert_eq!(path, staging.path_for(job_id));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b">a\nACGT\n");

        staging.discard(job_id).await;
        assert!(!path.exists());
        // Discarding twice is harmless.
        staging.discard(job_id).await;
    }
}
