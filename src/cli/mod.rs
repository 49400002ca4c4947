//! CLI commands

mod predict;
mod promote;
mod resolve;
mod serve;

pub use predict::predict;
pub use promote::promote;
pub use resolve::resolve;
pub use serve::serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// digitserve - serving layer for MNIST digit classifiers
#[derive(Parser)]
#[command(name = "digitserve")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML or JSON config file; environment variables override it
    #[arg(long, short, global = true, env = "DIGITSERVE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the prediction server
    Serve {
        /// Host to bind to (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides API_PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Classify an image file with the resolved model
    Predict {
        /// Image file (PNG, JPEG, ...)
        #[arg(long, short)]
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run model resolution once and report which source won
    Resolve,

    /// Register the best run's model and move it to a stage
    Promote {
        /// Registered model name (defaults to MODEL_NAME)
        #[arg(long)]
        model_name: Option<String>,

        /// Target stage (defaults to MODEL_STAGE)
        #[arg(long)]
        stage: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}
