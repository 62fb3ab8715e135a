mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs::{self, OpenOptions};

use tracing_subscriber::{prelude::*, EnvFilter};
use roster_core::config::{self, AppConfig};

/// Keep a local roster in sync with the game API and query it.
#[derive(Parser, Debug)]
#[command(name = "roster", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Paint from the cache, then refresh from upstream.
    Sync {
        /// Keep refreshing every `poll_interval_secs`.
        #[arg(long)]
        watch: bool,
    },
    /// Print the roster through the default filter and sort.
    List(commands::ListArgs),
    /// Manage the default filter.
    Filter {
        #[command(subcommand)]
        action: FilterCommand,
    },
}

#[derive(Subcommand, Debug)]
enum FilterCommand {
    /// Replace the default filter with a JSON filter config.
    Set {
        /// Filter config, e.g. `{"id":"owned","type":"owned"}`.
        json: String,
    },
    /// Show the default filter.
    Show,
    /// Remove the default filter.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load_from(&config_path)?;
    let app = commands::App::new(&config)?;

    match cli.command {
        Command::Sync { watch } => app.sync(watch, config.poll_interval()).await,
        Command::List(args) => app.list(args).await,
        Command::Filter { action } => match action {
            FilterCommand::Set { json } => app.set_filter(&json).await,
            FilterCommand::Show => app.show_filter().await,
            FilterCommand::Clear => app.clear_filter().await,
        },
    }
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("roster.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
