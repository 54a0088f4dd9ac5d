//! finca-progress - Stage completion service for expropriation cases
//!
//! Reads field surveys and signed deeds from the upstream REST services and
//! serves per-finca stage completion and progress percentages over HTTP.
//!
//! Configuration priority: CLI arguments > environment > TOML file > defaults.

use anyhow::{Context, Result};
use clap::Parser;
use finca_common::config::{self, TomlConfig};
use finca_progress::classifier::DeedClassifier;
use finca_progress::sources::http::http_source_set;
use finca_progress::{AggregatorSettings, AppState, StageCompletionAggregator};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "finca-progress")]
#[command(about = "Stage completion and progress service for expropriation cases")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [server].port)
    #[arg(short, long, env = "FINCA_PROGRESS_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides [server].host)
    #[arg(long, env = "FINCA_PROGRESS_HOST")]
    host: Option<String>,

    /// Write a config file with default values to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        config::write_toml_config(&TomlConfig::default(), path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let log_filter = finca_common::logging::init_tracing("info");
    let toml_config = config::load_config(args.config.as_deref())?;
    if let Err(e) = log_filter.apply_level(&toml_config.logging.level) {
        warn!("{}", e);
    }

    info!("Starting finca-progress");
    info!(
        "Version: {} (build {}, {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    info!("Sources: {}", toml_config.sources.base_url);

    let token = config::resolve_api_token(&toml_config);
    let sources = http_source_set(&toml_config.sources, token)?;
    let classifier = DeedClassifier::with_extra_aliases(&toml_config.classifier.extra_aliases)?;
    let settings = AggregatorSettings::from(&toml_config.aggregator);
    let aggregator = StageCompletionAggregator::new(sources, classifier, settings);

    let state = AppState::new(aggregator, toml_config.aggregator.max_batch_size);
    let app = finca_progress::build_router(state);

    let host = args.host.unwrap_or(toml_config.server.host);
    let port = args.port.unwrap_or(toml_config.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("finca-progress stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
