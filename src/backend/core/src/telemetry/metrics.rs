//! Prometheus metrics for the processing queue.
//!
//! Metrics go through the `metrics` facade. Until [`init_metrics`] installs
//! the Prometheus recorder every call is a no-op, which keeps unit tests
//! free of global state.
//!
//! # Example
//!
//! ```rust,ignore
//! use taxaformer_core::telemetry::metrics::QueueMetrics;
//!
//! QueueMetrics::admitted();
//! QueueMetrics::set_depth(3);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;

pub const ADMISSIONS_TOTAL: &str = "taxaformer_queue_admissions_total";
pub const REJECTIONS_TOTAL: &str = "taxaformer_queue_rejections_total";
pub const PROMOTIONS_TOTAL: &str = "taxaformer_queue_promotions_total";
pub const COMPLETIONS_TOTAL: &str = "taxaformer_queue_completions_total";
pub const TIMEOUTS_TOTAL: &str = "taxaformer_queue_timeouts_total";
pub const PURGED_TOTAL: &str = "taxaformer_queue_purged_total";
pub const QUEUE_DEPTH: &str = "taxaformer_queue_depth";
pub const WAIT_SECONDS: &str = "taxaformer_queue_wait_seconds";
pub const RUN_SECONDS: &str = "taxaformer_job_run_seconds";
pub const ERRORS_TOTAL: &str = "taxaformer_errors_total";

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for queue wait and job run times (in seconds)
    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,

    /// Global labels to add to all metrics
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            duration_buckets: default_duration_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_duration_buckets() -> Vec<f64> {
    vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]
}

/// Handle to the installed Prometheus recorder, if any.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// A registry that renders nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Initialize the metrics subsystem and install the global recorder.
///
/// # Errors
///
/// Returns an error if the buckets are invalid or a recorder is already
/// installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<MetricsRegistry> {
    if !config.enabled {
        return Ok(MetricsRegistry::disabled());
    }

    let mut builder = PrometheusBuilder::new();
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder
        .set_buckets_for_metric(Matcher::Full(WAIT_SECONDS.to_string()), &config.duration_buckets)?
        .set_buckets_for_metric(Matcher::Full(RUN_SECONDS.to_string()), &config.duration_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    tracing::info!(service_name = %service_name, "Metrics initialized");

    Ok(MetricsRegistry {
        prometheus_handle: Some(handle),
    })
}

fn register_metric_descriptions() {
    describe_counter!(ADMISSIONS_TOTAL, "Jobs admitted to the queue");
    describe_counter!(REJECTIONS_TOTAL, "Submissions rejected, by reason");
    describe_counter!(PROMOTIONS_TOTAL, "Jobs moved into the processing slot");
    describe_counter!(COMPLETIONS_TOTAL, "Jobs finished, by outcome");
    describe_counter!(TIMEOUTS_TOTAL, "Running jobs forced to failed after the timeout");
    describe_counter!(PURGED_TOTAL, "Queued jobs reclaimed after the retention window");
    describe_gauge!(QUEUE_DEPTH, "Number of queued jobs");
    describe_histogram!(WAIT_SECONDS, "Time from admission to promotion in seconds");
    describe_histogram!(RUN_SECONDS, "Time from promotion to completion in seconds");
    describe_counter!(ERRORS_TOTAL, "Service errors by code, category and severity");
}

/// Queue lifecycle metrics.
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn admitted() {
        counter!(ADMISSIONS_TOTAL).increment(1);
    }

    /// Record a rejected submission (`duplicate` or `full`).
    pub fn rejected(reason: &'static str) {
        counter!(REJECTIONS_TOTAL, "reason" => reason).increment(1);
    }

    /// Record a promotion and how long the job waited.
    pub fn promoted(waited_secs: f64) {
        counter!(PROMOTIONS_TOTAL).increment(1);
        histogram!(WAIT_SECONDS).record(waited_secs);
    }

    /// Record a completion and how long the job ran.
    pub fn completed(success: bool, run_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        counter!(COMPLETIONS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(RUN_SECONDS).record(run_secs);
    }

    pub fn timed_out() {
        counter!(TIMEOUTS_TOTAL).increment(1);
    }

    pub fn purged(count: usize) {
        counter!(PURGED_TOTAL).increment(count as u64);
    }

    pub fn set_depth(depth: usize) {
        gauge!(QUEUE_DEPTH).set(depth as f64);
    }
}
