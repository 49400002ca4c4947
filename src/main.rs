use anyhow::{Context, Result};
use clap::Parser;

use digitserve::cli::{Cli, Commands};
use digitserve::config::AppConfig;
use digitserve::telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        config.validate()?;
    }

    telemetry::init_logging(&config.logging, config.is_production())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Serve { .. } => digitserve::cli::serve(config).await,
            Commands::Predict { image, json } => digitserve::cli::predict(config, image, json).await,
            Commands::Resolve => digitserve::cli::resolve(config).await,
            Commands::Promote {
                model_name,
                stage,
                yes,
            } => digitserve::cli::promote(config, model_name, stage, yes).await,
        }
    })
}
