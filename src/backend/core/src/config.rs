//! Configuration management.
//!
//! Settings come from an optional file plus `TAXAFORMER__`-prefixed
//! environment variables, e.g. `TAXAFORMER__QUEUE__MAX_QUEUE_SIZE=2`.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{Result, TaxaError};
use crate::queue::{QueueConfig, WorkerConfig, MAX_WINDOW_SECS};
use crate::telemetry::TelemetryConfig;

const ENV_PREFIX: &str = "TAXAFORMER";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Queue limits and windows
    #[serde(default)]
    pub queue: QueueConfig,

    /// Embedded dispatcher
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Analysis executor
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Logging and metrics
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Directory for staged uploads
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Accepted upload extensions, including the leading dot
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            upload_dir: default_upload_dir(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Pause between classifier stages (milliseconds)
    #[serde(default)]
    pub step_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { step_delay_ms: 0 }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_upload_bytes() -> u64 { 50 * 1024 * 1024 }
fn default_upload_dir() -> PathBuf { std::env::temp_dir().join("taxaformer-uploads") }
fn default_allowed_extensions() -> Vec<String> {
    [".fasta", ".fa", ".fastq", ".fq", ".txt"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Reject settings the queue cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_queue_size == 0 {
            return Err(TaxaError::configuration("queue.max_queue_size must be at least 1"));
        }
        if self.queue.job_timeout_secs == 0 {
            return Err(TaxaError::configuration("queue.job_timeout_secs must be at least 1"));
        }
        if self.queue.retention_window_secs == 0 {
            return Err(TaxaError::configuration(
                "queue.retention_window_secs must be at least 1",
            ));
        }
        for (name, secs) in [
            ("queue.job_timeout_secs", self.queue.job_timeout_secs),
            ("queue.completion_grace_secs", self.queue.completion_grace_secs),
            ("queue.retention_window_secs", self.queue.retention_window_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(TaxaError::configuration(format!(
                    "{} must be at most {} seconds",
                    name, MAX_WINDOW_SECS
                )));
            }
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(TaxaError::configuration("worker.poll_interval_ms must be at least 1"));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(TaxaError::configuration("server.max_upload_bytes must be at least 1"));
        }
        if self.server.allowed_extensions.is_empty() {
            return Err(TaxaError::configuration(
                "server.allowed_extensions must not be empty",
            ));
        }
        Ok(())
    }
}
