//! Taxaformer CLI - submit sequence files and follow them through the queue.
//!
//! Provides analyze, queue, job, health, and configuration commands.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{analyze, config, health, job, queue};
use output::OutputFormat;

/// Taxaformer - sequence analysis queue CLI
#[derive(Parser)]
#[command(
    name = "taxaformer",
    version = "0.1.0",
    about = "Taxaformer - sequence analysis queue",
    long_about = "CLI tool for uploading sequence files to a Taxaformer server, \
                  following their place in the queue, and fetching reports.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "TAXAFORMER_API_URL")]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a sequence file for analysis
    Analyze(analyze::AnalyzeArgs),

    /// Queue status and statistics
    #[command(subcommand)]
    Queue(queue::QueueCommands),

    /// Job results, withdrawal and executor reports
    #[command(subcommand)]
    Job(job::JobCommands),

    /// Check server health
    Health(health::HealthArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let api_url = cli
        .api_url
        .clone()
        .or_else(|| config::load_value("api-url"))
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let client = client::ApiClient::new(&api_url)?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Analyze(args) => analyze::execute(args, &client, format).await,
        Commands::Queue(cmd) => queue::execute(cmd, &client, format).await,
        Commands::Job(cmd) => job::execute(cmd, &client, format).await,
        Commands::Health(args) => health::execute(args, &client, format).await,
        Commands::Config(cmd) => config::execute(cmd, format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
