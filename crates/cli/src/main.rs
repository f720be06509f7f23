//! # dartwiki-cli
//!
//! Command-line driver for the report generation pipeline. Configuration
//! comes from an optional `config.yml` and the environment (a `.env`
//! file is honored); artifacts land in a per-job directory under the
//! configured output directory.

mod config;
mod providers;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dartwiki::{
    ensure_embedding_dimension, CancellationFlag, FsReportSink, Pipeline, RunRequest,
    TracingJobStatus,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a configuration file (defaults to ./config.yml when present)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a report for a topic
    Generate(GenerateArgs),
    /// Validate configuration, store connectivity, and embedding dimension
    Check,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// The report topic, e.g. "SK하이닉스 기업 개요"
    #[arg(long)]
    topic: String,
    /// The target company, recorded in the run configuration
    #[arg(long)]
    company: Option<String>,
    /// Overrides the configured artifact output directory
    #[arg(long)]
    out_dir: Option<String>,
    /// Job identifier; a UUID is generated when omitted
    #[arg(long)]
    job_id: Option<String>,
    /// Maximum dialogue turns per persona
    #[arg(long)]
    max_conv_turn: Option<usize>,
    /// Maximum generated personas (the basic fact writer is extra)
    #[arg(long)]
    max_perspective: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let app = config::get_config(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Commands::Generate(args) => generate(app, args).await,
        Commands::Check => check(app).await,
    }
}

async fn generate(mut app: config::AppConfig, args: GenerateArgs) -> Result<()> {
    if let Some(max_conv_turn) = args.max_conv_turn {
        app.pipeline.max_conv_turn = max_conv_turn;
    }
    if let Some(max_perspective) = args.max_perspective {
        app.pipeline.max_perspective = max_perspective;
    }
    if let Some(out_dir) = args.out_dir {
        app.out_dir = out_dir;
    }

    let wiring = providers::Wiring::build(&app)
        .await
        .context("building providers")?;
    ensure_embedding_dimension(wiring.store.as_ref(), &wiring.embedder)
        .await
        .context("embedding dimension check")?;

    let job_id = args
        .job_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let request = RunRequest {
        job_id: job_id.clone(),
        topic: args.topic,
        company: args.company,
    };
    let sink = FsReportSink::new(&app.out_dir);
    let status = TracingJobStatus;

    info!(%job_id, "Starting report generation");
    let pipeline = Pipeline::new(
        wiring.suite,
        wiring.retriever,
        wiring.embedder,
        app.pipeline.clone(),
    )
    .with_call_log(wiring.call_log);
    pipeline
        .run(&request, &status, &sink, CancellationFlag::new())
        .await?;

    info!(%job_id, out_dir = %app.out_dir, "Report generation complete");
    Ok(())
}

async fn check(app: config::AppConfig) -> Result<()> {
    let wiring = providers::Wiring::build(&app)
        .await
        .context("building providers")?;
    ensure_embedding_dimension(wiring.store.as_ref(), &wiring.embedder)
        .await
        .context("embedding dimension check")?;
    info!("Configuration OK: store reachable, embedding dimensions match");
    Ok(())
}
