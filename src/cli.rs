//! Defines command-line interface options using `clap` for the ocean-climo application.

use clap::Parser;
use std::path::PathBuf;

/// Climatology maps from ocean-model output and reference products
#[derive(Parser, Debug)]
#[command(
    name = "ocean-climo",
    version,
    about = "Normalize ocean-model and reanalysis sources and compute climatology maps"
)]
pub struct Args {
    /// Path to the YAML run configuration
    #[arg(short, long)]
    pub config: PathBuf,

    /// Number of threads to use for parallel reductions. Overrides `threads` in the configuration.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Enable debug logging (unless OCEAN_CLIMO_LOG is set).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Validate the configuration and exit without reading data
    #[arg(long)]
    pub check: bool,
}
