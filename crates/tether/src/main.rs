//! tether - supervisor connectivity from the command line
//!
//! The binary wires the library crates together:
//! - activation (detect, launch, wait)
//! - one-shot health status
//! - control-channel requests
//! - a live view of heartbeats, domain events and health transitions

mod cli;
mod commands;
mod context;
mod output;
mod prompt;

use clap::Parser;
use cli::{Cli, Command};
use libtether_core::TetherError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level; logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run_command(&cli).await {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

async fn run_command(cli: &Cli) -> Result<(), TetherError> {
    match &cli.command {
        Command::Activate {
            startup,
            launch_target,
        } => commands::activate::run(cli, *startup, launch_target.clone()).await,
        Command::Status => commands::status::run(cli).await,
        Command::Request { cmd } => commands::request::run(cli, cmd.clone()).await,
        Command::Watch {
            no_activate,
            categories,
            no_beats,
        } => commands::watch::run(cli, *no_activate, categories.clone(), *no_beats).await,
    }
}
