//! TaskClaw CLI: the main entry point.
//!
//! Commands:
//! - `run`: work on a task interactively
//! - `init`: write the default config file
//! - `tools`: list the built-in tools

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "taskclaw",
    about = "TaskClaw: a terminal agent that works through tasks with tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.taskclaw/config.toml
    #[arg(short, long, global = true, env = "TASKCLAW_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session (asks for the task unless --task is given)
    Run {
        /// The initial task
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Write the default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List the built-in tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the session transcript.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run { task } => commands::run::run(config_path, task).await?,
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Tools => commands::tools::run(config_path)?,
    }

    Ok(())
}
