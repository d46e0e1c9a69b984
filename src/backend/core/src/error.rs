//! Error handling for Taxaformer Core.
//!
//! This module provides:
//! - A single service error type with context and chaining
//! - HTTP status code mapping for API responses
//! - Stable error codes for machine-readable API responses
//! - User-friendly messages vs detailed internal messages
//! - Error logging with tracing integration
//! - Metrics integration for error tracking
//!
//! # Usage
//!
//! ```rust,ignore
//! use taxaformer_core::error::{TaxaError, Result, ErrorContext};
//!
//! fn stage() -> Result<()> {
//!     std::fs::create_dir_all(dir).context("Failed to create upload directory")?;
//!     Ok(())
//! }
//! ```

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::queue::{JobId, QueueError};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for Taxaformer operations.
pub type Result<T> = std::result::Result<T, TaxaError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
///
/// These codes are stable and can be used by clients for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Queue Errors (1000-1099)
    DuplicateActiveJob,
    QueueFull,
    StaleUpdate,
    JobNotFound,
    ResultNotFound,
    ExecutorManaged,

    // Upload Errors (1100-1199)
    MissingFile,
    UnsupportedFileType,
    PayloadTooLarge,
    UploadFailed,

    // Analysis Errors (1200-1299)
    AnalysisFailed,
    NoSequencesFound,
    AnalysisTimeout,

    // Storage Errors (2000-2099)
    StorageError,
    RecordNotFound,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Validation Errors (4100-4199)
    InvalidInput,
    MissingRequiredField,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    MissingConfiguration,
    InvalidConfiguration,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            // Queue Errors
            Self::DuplicateActiveJob => 1000,
            Self::QueueFull => 1001,
            Self::StaleUpdate => 1002,
            Self::JobNotFound => 1003,
            Self::ResultNotFound => 1004,
            Self::ExecutorManaged => 1005,

            // Upload Errors
            Self::MissingFile => 1100,
            Self::UnsupportedFileType => 1101,
            Self::PayloadTooLarge => 1102,
            Self::UploadFailed => 1103,

            // Analysis Errors
            Self::AnalysisFailed => 1200,
            Self::NoSequencesFound => 1201,
            Self::AnalysisTimeout => 1202,

            // Storage Errors
            Self::StorageError => 2000,
            Self::RecordNotFound => 2004,

            // Serialization Errors
            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,
            Self::InvalidJson => 2202,

            // Validation Errors
            Self::InvalidInput => 4101,
            Self::MissingRequiredField => 4102,

            // Configuration Errors
            Self::ConfigurationError => 5000,
            Self::MissingConfiguration => 5001,
            Self::InvalidConfiguration => 5002,

            // Internal Errors
            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            // Not Found (404)
            Self::JobNotFound | Self::ResultNotFound | Self::RecordNotFound => {
                StatusCode::NOT_FOUND
            }

            // Conflict (409)
            Self::DuplicateActiveJob | Self::StaleUpdate | Self::ExecutorManaged => {
                StatusCode::CONFLICT
            }

            // Too Many Requests (429)
            Self::QueueFull => StatusCode::TOO_MANY_REQUESTS,

            // Payload Too Large (413)
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // Bad Request (400)
            Self::MissingFile | Self::UploadFailed | Self::InvalidJson => StatusCode::BAD_REQUEST,

            // Unprocessable Entity (422)
            Self::UnsupportedFileType
            | Self::NoSequencesFound
            | Self::InvalidInput
            | Self::MissingRequiredField => StatusCode::UNPROCESSABLE_ENTITY,

            // Timeout (504)
            Self::AnalysisTimeout => StatusCode::GATEWAY_TIMEOUT,

            // Internal Server Error (500)
            Self::AnalysisFailed
            | Self::StorageError
            | Self::SerializationError
            | Self::DeserializationError
            | Self::ConfigurationError
            | Self::MissingConfiguration
            | Self::InvalidConfiguration
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DuplicateActiveJob | Self::QueueFull | Self::AnalysisTimeout | Self::StorageError
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "queue",
            1100..=1199 => "upload",
            1200..=1299 => "analysis",
            2000..=2099 => "storage",
            2200..=2299 => "serialization",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging and alerting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// User errors (bad input, duplicate submissions)
    Low,
    /// Operational issues (back-pressure, timeouts)
    Medium,
    /// System errors (storage failures, analysis crashes)
    High,
    /// Critical errors requiring immediate attention
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub const fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::DuplicateActiveJob
            | ErrorCode::StaleUpdate
            | ErrorCode::JobNotFound
            | ErrorCode::ResultNotFound
            | ErrorCode::ExecutorManaged
            | ErrorCode::RecordNotFound
            | ErrorCode::MissingFile
            | ErrorCode::UnsupportedFileType
            | ErrorCode::PayloadTooLarge
            | ErrorCode::NoSequencesFound
            | ErrorCode::InvalidJson
            | ErrorCode::InvalidInput
            | ErrorCode::MissingRequiredField => Self::Low,

            ErrorCode::QueueFull
            | ErrorCode::UploadFailed
            | ErrorCode::AnalysisTimeout => Self::Medium,

            ErrorCode::AnalysisFailed
            | ErrorCode::StorageError
            | ErrorCode::SerializationError
            | ErrorCode::DeserializationError
            | ErrorCode::ConfigurationError
            | ErrorCode::MissingConfiguration
            | ErrorCode::InvalidConfiguration => Self::High,

            ErrorCode::InternalError => Self::Critical,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details about an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Additional context key-value pairs
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,

    /// Related entity ID (job, upload, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Retry information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,

    /// Suggested action for resolution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_action = Some(suggestion.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.context.is_empty()
            && self.entity_id.is_none()
            && self.retry_after_secs.is_none()
            && self.suggested_action.is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for Taxaformer Core.
///
/// Carries a stable [`ErrorCode`], a message that is safe to show to clients,
/// an optional internal message for logs, and structured details.
#[derive(Error, Debug)]
pub struct TaxaError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for TaxaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl TaxaError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details, keeping any context recorded so far.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        let context = std::mem::take(&mut self.details.context);
        self.details = details;
        for (key, value) in context {
            self.details.context.entry(key).or_insert(value);
        }
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    details = ?self.details,
                    source = ?self.source,
                    "CRITICAL ERROR"
                );
            }
            ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    "High severity error"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Medium severity error"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Low severity error"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "taxaformer_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "severity" => format!("{:?}", self.severity()),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Whether the request was successful (always false for errors)
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&TaxaError> for ErrorResponse {
    fn from(error: &TaxaError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                details: if error.details.is_empty() {
                    None
                } else {
                    Some(error.details.clone())
                },
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for TaxaError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let retry_after = self.details.retry_after_secs;
        let response = ErrorResponse::from(&self);

        let mut response = (status, Json(response)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Context Extension Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Add context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with error code.
    fn with_error_code(self, code: ErrorCode) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| TaxaError::internal(message.into()).with_source(e))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| TaxaError::new(code, e.to_string()).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| TaxaError::new(ErrorCode::RecordNotFound, message.into()))
    }

    fn with_error_code(self, code: ErrorCode) -> Result<T> {
        self.ok_or_else(|| TaxaError::new(code, "Resource not found"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<QueueError> for TaxaError {
    fn from(error: QueueError) -> Self {
        let message = error.to_string();
        match error {
            QueueError::DuplicateActiveJob { job_id } => {
                Self::new(ErrorCode::DuplicateActiveJob, message).with_details(
                    ErrorDetails::new()
                        .with_entity("job", job_id.to_string())
                        .with_suggestion("Poll the queue status until your current job finishes"),
                )
            }
            QueueError::QueueFull { capacity, estimated_wait_secs } => {
                Self::new(ErrorCode::QueueFull, message)
                    .with_context("capacity", capacity)
                    .with_details(ErrorDetails::new().with_retry_after(estimated_wait_secs.max(1)))
            }
            QueueError::StaleUpdate { job_id } => Self::new(ErrorCode::StaleUpdate, message)
                .with_details(ErrorDetails::new().with_entity("job", job_id.to_string())),
        }
    }
}

impl From<serde_json::Error> for TaxaError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() {
            ErrorCode::DeserializationError
        } else if error.is_eof() {
            ErrorCode::InvalidJson
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string()).with_source(error)
    }
}

impl From<std::io::Error> for TaxaError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let (code, user_msg) = match error.kind() {
            ErrorKind::NotFound => (ErrorCode::RecordNotFound, "File or resource not found"),
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                (ErrorCode::InvalidInput, "Uploaded file could not be read")
            }
            _ => (ErrorCode::StorageError, "An I/O error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<MultipartError> for TaxaError {
    fn from(error: MultipartError) -> Self {
        let status = error.status();
        let (code, user_msg) = if status == StatusCode::PAYLOAD_TOO_LARGE {
            (ErrorCode::PayloadTooLarge, "Uploaded file is too large")
        } else {
            (ErrorCode::UploadFailed, "Malformed multipart upload")
        };

        Self::with_internal(code, user_msg, error.body_text()).with_source(error)
    }
}

impl From<anyhow::Error> for TaxaError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<TaxaError>() {
            Ok(taxa_error) => taxa_error,
            Err(error) => Self::with_internal(
                ErrorCode::InternalError,
                "An internal error occurred",
                error.to_string(),
            ),
        }
    }
}

impl From<config::ConfigError> for TaxaError {
    fn from(error: config::ConfigError) -> Self {
        let (code, user_msg) = match &error {
            config::ConfigError::NotFound(_) => (
                ErrorCode::MissingConfiguration,
                "Required configuration not found",
            ),
            config::ConfigError::PathParse(_) | config::ConfigError::FileParse { .. } => (
                ErrorCode::InvalidConfiguration,
                "Configuration file is invalid",
            ),
            _ => (ErrorCode::ConfigurationError, "Configuration error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Convenience Constructors for Domain Errors
// ═══════════════════════════════════════════════════════════════════════════════

impl TaxaError {
    /// Create a job not found error.
    pub fn job_not_found(job_id: JobId) -> Self {
        Self::new(ErrorCode::JobNotFound, format!("Job not found: {}", job_id))
            .with_details(ErrorDetails::new().with_entity("job", job_id.to_string()))
    }

    /// Create a result not found error.
    pub fn result_not_found(job_id: JobId) -> Self {
        Self::new(
            ErrorCode::ResultNotFound,
            format!("No analysis result available for job {}", job_id),
        )
        .with_details(
            ErrorDetails::new()
                .with_entity("job", job_id.to_string())
                .with_suggestion("Results are kept only for completed jobs within the retention window"),
        )
    }

    /// Executor endpoints are refused while the embedded dispatcher owns the queue.
    pub fn executor_managed() -> Self {
        Self::new(
            ErrorCode::ExecutorManaged,
            "Jobs are executed by the embedded dispatcher on this server",
        )
        .with_details(ErrorDetails::new().with_suggestion(
            "Start the server with worker.enabled = false to drive the queue externally",
        ))
    }

    /// Create an unsupported file type error.
    pub fn unsupported_file_type(filename: &str, allowed: &[String]) -> Self {
        Self::new(
            ErrorCode::UnsupportedFileType,
            format!("Unsupported file type. Allowed: {}", allowed.join(", ")),
        )
        .with_context("filename", filename)
    }

    /// Create a payload too large error.
    pub fn payload_too_large(size: u64, limit: u64) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            format!("Uploaded file is {} bytes, limit is {} bytes", size, limit),
        )
        .with_context("size", size)
        .with_context("limit", limit)
    }

    /// Create an analysis failed error.
    pub fn analysis_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::AnalysisFailed,
            format!("Analysis failed: {}", reason.into()),
        )
    }

    /// Create an analysis timeout error.
    pub fn analysis_timeout(job_id: JobId, timeout_secs: u64) -> Self {
        Self::new(
            ErrorCode::AnalysisTimeout,
            format!("Analysis of job {} exceeded {}s", job_id, timeout_secs),
        )
        .with_context("timeout_secs", timeout_secs)
        .with_details(ErrorDetails::new().with_entity("job", job_id.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::DuplicateActiveJob.http_status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::QueueFull.http_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorCode::ResultNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ExecutorManaged.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::UnsupportedFileType.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ErrorCode::InternalError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_code_is_retryable() {
        assert!(ErrorCode::QueueFull.is_retryable());
        assert!(ErrorCode::DuplicateActiveJob.is_retryable());
        assert!(!ErrorCode::UnsupportedFileType.is_retryable());
        assert!(!ErrorCode::JobNotFound.is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(ErrorCode::QueueFull.category(), "queue");
        assert_eq!(ErrorCode::PayloadTooLarge.category(), "upload");
        assert_eq!(ErrorCode::NoSequencesFound.category(), "analysis");
        assert_eq!(ErrorCode::InvalidConfiguration.category(), "configuration");
    }

    #[test]
    fn test_queue_full_carries_retry_after() {
        let error = TaxaError::from(QueueError::QueueFull {
            capacity: 10,
            estimated_wait_secs: 95,
        });
        assert_eq!(error.code(), ErrorCode::QueueFull);
        assert_eq!(error.details().retry_after_secs, Some(95));
        assert!(error.details().context.contains_key("capacity"));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "95"
        );
    }

    #[test]
    fn test_duplicate_job_points_at_existing_job() {
        let job_id = JobId::new();
        let error = TaxaError::from(QueueError::DuplicateActiveJob { job_id });
        assert_eq!(error.code(), ErrorCode::DuplicateActiveJob);
        assert_eq!(error.details().entity_id, Some(job_id.to_string()));
        assert!(error.user_message().contains("already have a job"));
    }

    #[test]
    fn test_error_context() {
        let error = TaxaError::new(ErrorCode::InvalidInput, "Invalid input")
            .with_context("field", "session_id")
            .with_context("reason", "empty");

        assert!(error.details().context.contains_key("field"));
        assert!(error.details().context.contains_key("reason"));
    }

    #[test]
    fn test_with_details_keeps_context() {
        let error = TaxaError::new(ErrorCode::QueueFull, "full")
            .with_context("capacity", 2)
            .with_details(ErrorDetails::new().with_retry_after(30));

        assert!(error.details().context.contains_key("capacity"));
        assert_eq!(error.details().retry_after_secs, Some(30));
    }

    #[test]
    fn test_error_response_serialization() {
        let error = TaxaError::unsupported_file_type("notes.pdf", &[".fasta".to_string()]);
        let response = ErrorResponse::from(&error);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("UNSUPPORTED_FILE_TYPE"));
        assert!(json.contains("notes.pdf"));
        assert!(json.contains("1101"));
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::DuplicateActiveJob),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::QueueFull),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::StorageError),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorSeverity::from_code(&ErrorCode::InternalError),
            ErrorSeverity::Critical
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = TaxaError::from(io);
        assert_eq!(error.code(), ErrorCode::StorageError);
        assert_eq!(error.internal_message(), Some("denied"));
    }

    #[test]
    fn test_error_display() {
        let error = TaxaError::with_internal(
            ErrorCode::StorageError,
            "Could not stage upload",
            "No space left on device",
        );

        let display = format!("{}", error);
        assert!(display.contains("StorageError"));
        assert!(display.contains("Could not stage upload"));
        assert!(display.contains("No space left"));
    }
}
