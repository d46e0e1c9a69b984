//! Taxaformer Server - Main entry point
//!
//! Accepts sequence uploads and analyses them one at a time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;

use taxaformer_core::{
    analysis::{MockClassifier, ResultStore, UploadStaging},
    api::{self, AppState},
    config::Config,
    queue::{Dispatcher, ProcessingQueue},
    telemetry,
};

#[derive(Parser, Debug)]
#[command(name = "taxaformer-server", version, about = "Taxaformer analysis server")]
struct Args {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "TAXAFORMER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match args.config.as_deref() {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    let telemetry = telemetry::init_telemetry(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_queue_size = config.queue.max_queue_size,
        job_timeout_secs = config.queue.job_timeout_secs,
        "Starting Taxaformer Server"
    );

    let staging = UploadStaging::new(
        config.server.upload_dir.clone(),
        config.server.allowed_extensions.clone(),
    )
    .await?;
    tracing::info!(dir = %staging.dir().display(), "Upload staging ready");

    let queue = Arc::new(ProcessingQueue::new(config.queue.clone()));
    let results = ResultStore::new();
    let wake = Arc::new(Notify::new());

    // Embedded consumer; disable it to drive the queue through the executor
    // endpoints instead.
    let dispatcher = if config.worker.enabled {
        let classifier = MockClassifier::new()
            .with_step_delay(Duration::from_millis(config.analysis.step_delay_ms));
        let handle = Dispatcher::new(
            queue.clone(),
            Arc::new(classifier),
            staging.clone(),
            results.clone(),
            config.worker.clone(),
        )
        .with_wake(wake.clone())
        .start();
        Some(handle)
    } else {
        tracing::info!("Embedded dispatcher disabled, waiting for an external executor");
        None
    };

    let app_state = AppState::new(
        queue,
        results,
        staging,
        wake,
        config.server.max_upload_bytes,
    )
    .with_metrics(telemetry.metrics.clone())
    .with_embedded_dispatcher(dispatcher.is_some());

    let app = api::build_router(app_state);

    let addr: SocketAddr = config.server.bind_address().parse()?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = dispatcher {
        let timeout = Duration::from_secs(config.worker.shutdown_timeout_secs);
        if !handle.stop(timeout).await {
            tracing::warn!("Dispatcher did not stop in time and was aborted");
        }
    }

    telemetry.shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
