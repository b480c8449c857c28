//! hotmod CLI - run, watch and check hot-reloadable modules

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli))
}

async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { file, args } => {
            commands::run::run(config, &file, &args).await?;
        }

        Commands::Watch {
            file,
            interval_ms,
            times,
            args,
        } => {
            commands::watch::run(config, &file, interval_ms, times, &args).await?;
        }

        Commands::Check { file } => {
            commands::check::run(&config, &file)?;
        }
    }

    Ok(())
}
