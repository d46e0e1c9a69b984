//! V1 API routes.

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::{handlers, AppState};

/// V1 API prefix.
pub const V1_PREFIX: &str = "/api/v1";

/// Build the V1 API router.
///
/// All routes are mounted under `/api/v1/`.
///
/// # Endpoints
///
/// ## Intake
/// - `POST /api/v1/analyze` - Upload a file (multipart) and join the queue
/// - `GET /api/v1/queue/status?session_id=` - Caller's queue status
/// - `GET /api/v1/queue/stats` - Global queue snapshot
///
/// ## Jobs
/// - `GET /api/v1/jobs/:id/result` - Analysis report of a finished job
/// - `DELETE /api/v1/jobs/:id?session_id=` - Withdraw a queued job
///
/// ## Executor
/// - `POST /api/v1/queue/promote` - Promote the next job
/// - `POST /api/v1/jobs/:id/progress` - Report progress
/// - `POST /api/v1/jobs/:id/complete` - Report the outcome
pub fn v1_router() -> Router<AppState> {
    Router::new()
        // Intake
        .route("/analyze", post(handlers::analyze))
        .route("/queue/status", get(handlers::queue_status))
        .route("/queue/stats", get(handlers::queue_stats))
        // Jobs
        .route("/jobs/:id", delete(handlers::withdraw_job))
        .route("/jobs/:id/result", get(handlers::get_result))
        // Executor
        .route("/queue/promote", post(handlers::promote_next))
        .route("/jobs/:id/progress", post(handlers::report_progress))
        .route("/jobs/:id/complete", post(handlers::complete_job))
}

/// V1 API route constants for use in clients and documentation.
pub mod paths {
    pub const ANALYZE: &str = "/api/v1/analyze";
    pub const QUEUE_STATUS: &str = "/api/v1/queue/status";
    pub const QUEUE_STATS: &str = "/api/v1/queue/stats";
    pub const QUEUE_PROMOTE: &str = "/api/v1/queue/promote";
    pub const JOB: &str = "/api/v1/jobs/:id";
    pub const JOB_RESULT: &str = "/api/v1/jobs/:id/result";
    pub const JOB_PROGRESS: &str = "/api/v1/jobs/:id/progress";
    pub const JOB_COMPLETE: &str = "/api/v1/jobs/:id/complete";

    /// Substitute the `:id` segment of a job route.
    pub fn job(route: &str, id: impl std::fmt::Display) -> String {
        route.replace(":id", &id.to_string())
    }
}
