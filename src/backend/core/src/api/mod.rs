//! HTTP API for Taxaformer.
//!
//! The intake layer is a thin shell over [`ProcessingQueue`]: it validates
//! uploads, stages them, admits jobs and exposes the caller-facing status
//! views. Executor endpoints let an external worker drive the queue when the
//! embedded dispatcher is disabled.
//!
//! - `GET /health`, `GET /metrics` (unversioned)
//! - `/api/v1/...` (see [`routes::v1_router`])

mod handlers;
pub mod routes;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::analysis::{ResultStore, UploadStaging};
use crate::error::TaxaError;
use crate::queue::ProcessingQueue;
use crate::telemetry::MetricsRegistry;

pub use handlers::{AnalyzeResponse, CompleteRequest, ProgressRequest, UpdateResponse};

/// Multipart framing allowance on top of the upload limit.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<ProcessingQueue>,
    pub results: ResultStore,
    pub staging: UploadStaging,
    /// Wakes the dispatcher after an admission
    pub wake: Arc<Notify>,
    pub metrics: MetricsRegistry,
    pub max_upload_bytes: u64,
    /// Set when the embedded dispatcher promotes and runs jobs; the executor
    /// endpoints are refused in that mode.
    pub embedded_dispatcher: bool,
}

impl AppState {
    pub fn new(
        queue: Arc<ProcessingQueue>,
        results: ResultStore,
        staging: UploadStaging,
        wake: Arc<Notify>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            queue,
            results,
            staging,
            wake,
            metrics: MetricsRegistry::disabled(),
            max_upload_bytes,
            embedded_dispatcher: false,
        }
    }

    pub fn with_embedded_dispatcher(mut self, enabled: bool) -> Self {
        self.embedded_dispatcher = enabled;
        self
    }

    /// Executor endpoints are only served when no embedded dispatcher runs.
    pub(crate) fn ensure_external_executor(&self) -> Result<(), TaxaError> {
        if self.embedded_dispatcher {
            return Err(TaxaError::executor_managed());
        }
        Ok(())
    }

    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let state = AppState::new(queue, results, staging, wake, 50 * 1024 * 1024);
/// let app = build_router(state);
/// ```
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = (state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES) as usize;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest(routes::V1_PREFIX, routes::v1_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: None,
        }
    }

    pub fn from_taxa_error(err: &TaxaError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.user_message().to_string()),
            error_code: Some(err.code().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, Some("test data"));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_error() {
        let response: ApiResponse<()> = ApiResponse::error("test error");
        assert!(!response.success);
        assert!(response.data.is_none());
        assert_eq!(response.error, Some("test error".to_string()));
    }

    #[test]
    fn test_api_response_from_error() {
        let err = TaxaError::new(ErrorCode::QueueFull, "Queue is full");
        let response: ApiResponse<()> = ApiResponse::from_taxa_error(&err);
        assert_eq!(response.error_code.as_deref(), Some("QueueFull"));
        assert_eq!(response.error.as_deref(), Some("Queue is full"));
    }
}
