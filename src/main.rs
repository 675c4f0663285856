use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use screenprint::{load_records, EngineError, Params};

/// Animated category swarm through a halftone screen.
#[derive(Parser)]
#[command(name = "screenprint")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Parameter file (JSON); missing fields keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Animate a dataset in a window
    Run {
        /// Entity dataset (JSON array)
        dataset: PathBuf,

        /// Pull entities toward per-category anchors
        #[arg(short, long)]
        grouping: bool,

        /// Seed for initial positions
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Halftone a single image
    Still {
        /// Input image
        input: PathBuf,

        /// Output image (format from extension)
        output: PathBuf,
    },
}

fn load_params(config: Option<&Path>) -> Result<Params, EngineError> {
    match config {
        Some(path) => {
            let params = Params::load(path)?;
            tracing::info!(path = %path.display(), "loaded parameters");
            Ok(params)
        }
        None => Ok(Params::default()),
    }
}

fn run(cli: Cli) -> Result<(), EngineError> {
    let mut params = load_params(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            dataset,
            grouping,
            seed,
        } => {
            let records = load_records(&dataset)?;
            params.grouping |= grouping;
            if let Some(seed) = seed {
                params.seed = seed;
            }
            screenprint::window::run(params, records)
        }
        Commands::Still { input, output } => {
            screenprint::halftone::halftone_file(&input, &output, &params.halftone)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("screenprint=info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
