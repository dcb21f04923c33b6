//! anomtree CLI - grow and inspect anomaly taxonomies.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anomtree")]
#[command(author, version, about = "anomtree - Self-organizing anomaly taxonomies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new anomtree project
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Classify every row of a contribution CSV
    Classify {
        /// Scorer output with `ts` and `contribution_*` columns
        csv: String,

        /// Directory for the classified table and taxonomy JSON
        #[arg(short, long)]
        out: Option<String>,

        /// Wipe the stored taxonomy before classifying
        #[arg(long)]
        reset: bool,

        /// Skip writing the classified table
        #[arg(long)]
        no_csv: bool,
    },

    /// Print the taxonomy
    Tree {
        /// Show every template instead of the latest per leaf
        #[arg(short, long)]
        full: bool,
    },

    /// Export the taxonomy as JSON
    Export {
        /// Output file path
        output: String,
    },

    /// Show taxonomy statistics
    Stats,

    /// Finish or undo interrupted leaf splits
    Recover,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Classify {
            csv,
            out,
            reset,
            no_csv,
        } => commands::classify::run(&csv, out.as_deref(), reset, no_csv, cli.verbose).await,
        Commands::Tree { full } => commands::tree::run(full),
        Commands::Export { output } => commands::export::run(&output),
        Commands::Stats => commands::stats::run(),
        Commands::Recover => commands::recover::run(),
    }
}
