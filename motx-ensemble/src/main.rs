//! motx-ensemble - MOT screenshot extraction service
//!
//! Runs every configured vision backend on an uploaded screenshot, fuses the
//! answers by weighted consensus, validates the registration and expiry date,
//! optionally cross-checks the registry, and flags results for manual review.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use motx_ensemble::config::ServiceConfig;
use motx_ensemble::extractors::{backends_from_config, ParallelExtractor};
use motx_ensemble::pipeline::{registry_from_config, EnsemblePipeline};
use motx_ensemble::AppState;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "motx-ensemble")]
#[command(about = "MOT screenshot ensemble extraction service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MOTX_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host (overrides config)
    #[arg(long, env = "MOTX_HOST")]
    host: Option<String>,

    /// Bind port (overrides config)
    #[arg(short, long, env = "MOTX_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    motx_common::logging::init_tracing(&config.logging)
        .context("Failed to initialise logging")?;

    info!(
        "Starting motx-ensemble v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let backends = backends_from_config(&config.backends);
    let extractor = ParallelExtractor::new(backends, config.ensemble.model_timeout());
    let registry = registry_from_config(&config.registry);
    let pipeline = EnsemblePipeline::new(extractor, config.ensemble.engine(), registry);

    let bind_address = config.server.bind_address();
    let state = AppState::new(pipeline, config);
    let app = motx_ensemble::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
