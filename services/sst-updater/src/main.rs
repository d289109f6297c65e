//! SST updater binary.
//!
//! One invocation is one run: discover timestamps, fetch what is not yet
//! on disk, write artifacts, purge expired files and rebuild the manifest.
//! Meant to be driven by an external scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sst_common::{parse_iso, ArtifactMode, PipelineConfig};
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sst_updater::{ErddapClient, Pipeline, ReqwestTransport, RunOptions, TimeSelector};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug)]
#[command(name = "sst-updater")]
#[command(about = "Fetch SST grids from griddap mirrors and refresh the artifact directory")]
struct Args {
    /// Pipeline configuration (YAML). Built-in defaults when omitted.
    #[arg(short, long, env = "SST_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact directory (overrides the config file)
    #[arg(short, long, env = "SST_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Artifact mode: points or raster (overrides the config file)
    #[arg(long)]
    mode: Option<ArtifactMode>,

    /// Process this ISO-8601 timestamp only
    #[arg(long, conflicts_with = "latest")]
    timestamp: Option<String>,

    /// Process only the newest timestamp of each source
    #[arg(long)]
    latest: bool,

    /// Overwrite artifacts that already exist
    #[arg(long)]
    force: bool,

    /// Only process these source ids (repeatable)
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Do not rewrite the manifest
    #[arg(long)]
    skip_manifest: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = FmtSubscriber::builder().with_env_filter(filter).with_target(true);
    match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(mode) = args.mode {
        config.artifact.mode = mode;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn selector(args: &Args) -> Result<Option<TimeSelector>> {
    if let Some(ts) = &args.timestamp {
        let ts = parse_iso(ts).with_context(|| format!("invalid --timestamp {}", ts))?;
        return Ok(Some(TimeSelector::Explicit(ts)));
    }
    Ok(args.latest.then_some(TimeSelector::Latest))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = load_config(&args)?;
    let options = RunOptions {
        force: args.force,
        selector: selector(&args)?,
        skip_manifest: args.skip_manifest,
    };

    info!(
        output_dir = %config.output_dir.display(),
        mode = ?config.artifact.mode,
        force = options.force,
        "Starting SST update"
    );

    let transport = ReqwestTransport::new(config.http.axis_timeout()).context("failed to build HTTP client")?;
    let client = ErddapClient::new(Arc::new(transport), &config.http);
    #[cfg(feature = "netcdf")]
    let client = client.with_decoder(Arc::new(griddap_parser::NetCdfDecoder));

    let pipeline = Pipeline::new(config, client, options).with_sources(&args.sources);
    if pipeline.registry().is_empty() {
        anyhow::bail!("no sources to process (filter: {:?})", args.sources);
    }

    let summary = pipeline.run(chrono::Utc::now()).await?;
    info!(summary = %serde_json::to_string(&summary)?, "Update finished");

    if summary.is_hard_failure() {
        error!(
            failed = summary.failed(),
            manifest_latest = ?summary.manifest_latest,
            "No source yielded data and the manifest is stale"
        );
        anyhow::bail!("update produced no data and the manifest is not current");
    }

    Ok(())
}
