use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tierwise")]
#[command(version)]
#[command(about = "Self-learning flagship/lightweight model router")]
pub struct Cli {
    /// Router config (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Route a query and print the decision as JSON
    Route {
        /// Query text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Skip the embedding provider (overrides, keywords and default only)
        #[arg(long)]
        offline: bool,
    },

    /// Show patch store statistics
    Inspect,

    /// Compact the patch store now
    Compact,

    /// Print the effective configuration
    Config,

    /// Print version information
    Version,
}
