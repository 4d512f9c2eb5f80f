mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let load = || commands::load_config(cli.config.as_deref());

    match cli.command {
        Commands::Route { query, offline } => {
            commands::route::run(&load()?, &query.join(" "), offline)
        }
        Commands::Inspect => commands::inspect::run(&load()?),
        Commands::Compact => commands::compact::run(&load()?),
        Commands::Config => commands::config::run(&load()?),
        Commands::Version => commands::version::run(),
    }
}
