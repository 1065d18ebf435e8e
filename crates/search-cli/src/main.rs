mod config;
mod pipeline;
mod problem;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::SearchOverrides;
use pipeline::{CheckConfigArgs, RunArgs};

/// library-search: run `exact?`, `apply?` and `exact?%` against a lemma corpus.
#[derive(Parser)]
#[command(name = "library-search", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the invocation of one problem file and print its suggestions.
    Run {
        /// Path to search config TOML file. Built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Path to the problem TOML file.
        #[arg(long)]
        problem: PathBuf,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
        /// Override the number of accepted candidates per goal.
        #[arg(long)]
        max_results: Option<usize>,
        /// Override the heartbeat budget (0 = no limit).
        #[arg(long)]
        max_heartbeats: Option<u64>,
        /// Leave the goal open when `exact?` fails instead of admitting it.
        #[arg(long)]
        no_admit: bool,
    },
    /// Validate a search config file and print the effective values.
    CheckConfig {
        /// Path to search config TOML file.
        #[arg(long, default_value = "configs/search.toml")]
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            problem,
            json,
            max_results,
            max_heartbeats,
            no_admit,
        } => pipeline::run_search(RunArgs {
            config,
            problem,
            overrides: SearchOverrides {
                max_results,
                max_heartbeats,
                no_admit,
            },
            json,
        }),
        Command::CheckConfig { config } => pipeline::run_check_config(CheckConfigArgs { config }),
    }
}
