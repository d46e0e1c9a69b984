//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, TaxaError>` so that errors
//! are converted to HTTP status codes via the `IntoResponse` implementation
//! on `TaxaError`.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{ApiResponse, AppState};
use crate::analysis::AnalysisReport;
use crate::error::{ErrorCode, TaxaError};
use crate::queue::{JobId, JobState, QueueError, QueueStatusView};

const ANONYMOUS_SESSION: &str = "anonymous";

fn session_or_anonymous(session_id: Option<String>) -> String {
    session_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ANONYMOUS_SESSION.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health and Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "queue_length": state.queue.queue_len(),
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Intake
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub job_id: JobId,
    /// Whether an earlier report for identical content was returned
    pub cached: bool,
    /// The caller's queue status right after admission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueStatusView>,
    /// The cached report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
}

struct Upload {
    filename: String,
    bytes: axum::body::Bytes,
}

pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, TaxaError> {
    let mut upload = None;
    let mut session_id = None;
    let mut metadata = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload = Some(Upload { filename, bytes });
            }
            Some("session_id") => session_id = Some(field.text().await?),
            Some("metadata") => metadata = Some(field.text().await?),
            _ => {}
        }
    }

    let Upload { filename, bytes } = upload
        .ok_or_else(|| TaxaError::new(ErrorCode::MissingFile, "No file provided"))?;
    if filename.trim().is_empty() {
        return Err(TaxaError::new(
            ErrorCode::MissingRequiredField,
            "No filename provided",
        ));
    }
    state.staging.check_extension(&filename)?;

    let size = bytes.len() as u64;
    if size > state.max_upload_bytes {
        return Err(TaxaError::payload_too_large(size, state.max_upload_bytes));
    }

    let session = session_or_anonymous(session_id);

    // Sample metadata is optional and advisory; a malformed value is logged
    // and otherwise ignored.
    if let Some(raw) = metadata.filter(|m| !m.trim().is_empty()) {
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => tracing::debug!(session = %session, metadata = %value, "Received sample metadata"),
            Err(e) => tracing::warn!(session = %session, error = %e, "Ignoring unparseable sample metadata"),
        }
    }

    let file_sha256 = hex::encode(Sha256::digest(&bytes));
    if let Some(cached) = state.results.find_by_hash(&file_sha256) {
        tracing::info!(
            session = %session,
            job_id = %cached.job_id,
            "Returning cached report for identical upload"
        );
        let response = AnalyzeResponse {
            job_id: cached.job_id,
            cached: true,
            queue: None,
            result: Some(cached.report),
        };
        return Ok((StatusCode::OK, Json(ApiResponse::success(response))));
    }

    // Cheap rejection before anything touches the disk; admission re-checks
    // under the queue lock.
    if let Some(existing) = state.queue.find_active_job(&session) {
        return Err(QueueError::DuplicateActiveJob { job_id: existing.id }.into());
    }

    // Stage before admitting so the dispatcher never sees a job without input.
    let job_id = JobId::new();
    state.staging.stage(job_id, &bytes).await?;

    let job = match state.queue.admit_with_id(job_id, &session, &filename, size) {
        Ok(job) => job,
        Err(e) => {
            state.staging.discard(job_id).await;
            return Err(e.into());
        }
    };
    state.wake.notify_one();

    let response = AnalyzeResponse {
        job_id: job.id,
        cached: false,
        queue: Some(state.queue.status_for(&session)),
        result: None,
    };
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

pub async fn queue_status(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, TaxaError> {
    let session = session_or_anonymous(query.session_id);
    Ok(Json(ApiResponse::success(state.queue.status_for(&session))))
}

pub async fn queue_stats(State(state): State<AppState>) -> Result<impl IntoResponse, TaxaError> {
    Ok(Json(ApiResponse::success(state.queue.stats())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, TaxaError> {
    let job_id = JobId::from(id);
    let stored = state
        .results
        .get(job_id)
        .ok_or_else(|| TaxaError::result_not_found(job_id))?;
    Ok(Json(ApiResponse::success(stored)))
}

/// Withdraw the caller's own queued job.
pub async fn withdraw_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SessionQuery>,
) -> Result<impl IntoResponse, TaxaError> {
    let job_id = JobId::from(id);
    let session = session_or_anonymous(query.session_id);

    let owned = state
        .queue
        .find_active_job(&session)
        .filter(|job| job.id == job_id)
        .ok_or_else(|| TaxaError::job_not_found(job_id))?;

    let withdrawn = state
        .queue
        .withdraw(owned.id)
        .ok_or_else(|| {
            TaxaError::new(ErrorCode::InvalidInput, "Only queued jobs can be withdrawn")
                .with_context("job_id", job_id)
        })?;
    state.staging.discard(withdrawn.id).await;

    Ok(Json(ApiResponse::success(withdrawn)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Executor
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether an executor report was applied. Stale reports are not errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressRequest {
    pub percent: i64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CompleteRequest {
    pub success: bool,
    /// Report produced by an external executor
    #[serde(default)]
    pub result: Option<AnalysisReport>,
}

pub async fn promote_next(State(state): State<AppState>) -> Result<impl IntoResponse, TaxaError> {
    state.ensure_external_executor()?;
    Ok(Json(ApiResponse::success(state.queue.try_promote_next())))
}

pub async fn report_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProgressRequest>,
) -> Result<impl IntoResponse, TaxaError> {
    state.ensure_external_executor()?;
    let response = match state.queue.report_progress(JobId::from(id), req.percent) {
        Ok(progress) => UpdateResponse {
            applied: true,
            progress: Some(progress),
        },
        Err(QueueError::StaleUpdate { job_id }) => {
            tracing::debug!(job_id = %job_id, "Ignoring stale progress report");
            UpdateResponse {
                applied: false,
                progress: None,
            }
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ApiResponse::success(response)))
}

pub async fn complete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CompleteRequest>,
) -> Result<impl IntoResponse, TaxaError> {
    state.ensure_external_executor()?;
    let job_id = JobId::from(id);

    // Only an accepted successful completion stores its report.
    let response = match state.queue.complete(job_id, req.success) {
        Ok(job) => {
            if job.state == JobState::Completed {
                if let Some(report) = req.result {
                    state.results.insert(job_id, report);
                }
            }
            state.staging.discard(job_id).await;
            UpdateResponse {
                applied: true,
                progress: Some(job.progress_percent),
            }
        }
        Err(QueueError::StaleUpdate { job_id }) => {
            tracing::debug!(job_id = %job_id, "Ignoring stale completion");
            UpdateResponse {
                applied: false,
                progress: None,
            }
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ApiResponse::success(response)))
}
