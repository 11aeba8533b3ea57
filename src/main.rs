//! Entry point for the ocean-climo application.
//! Handles CLI parsing, logging setup and dispatches one configured run.

use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use ocean_climo::analysis::{Analysis, LoggingRenderer};
use ocean_climo::config::RunConfig;
use ocean_climo::errors::Result;
use ocean_climo::parallel::{ParallelConfig, ParallelInfo};
use std::process::ExitCode;

mod cli;

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let env = Env::new().filter_or("OCEAN_CLIMO_LOG", default_level);
    Builder::from_env(env).format_timestamp_millis().init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = RunConfig::from_yaml_file(&args.config)?;
    if args.check {
        info!(
            "Configuration {} is valid ({} data sources)",
            args.config.display(),
            config.data_sources.len()
        );
        return Ok(());
    }

    ParallelConfig::new(args.threads.or(config.threads)).setup_global_pool()?;
    ParallelInfo::current().log();

    let analysis = Analysis::from_config(config)?;
    let mut renderer = LoggingRenderer::default();
    let plots = analysis.run(&mut renderer)?;
    info!("Generated {} plots", plots.len());
    Ok(())
}
