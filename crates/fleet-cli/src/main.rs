//! Fleet CLI - Command-line interface for the fleet management database
//!
//! List, edit and watch records, manage dashboard sign-in and the client
//! config from the terminal.

mod cli;
mod commands;
mod error;
mod session_store;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{load_config, open_client, resolve_config_path};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::records::run_records;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "fleet=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Records { command } => {
            let path = resolve_config_path(cli.config.as_deref())?;
            let config = load_config(&path)?;
            let client = open_client(&config)?;
            run_records(command, &client).await
        }
        Commands::Auth { command } => {
            let path = resolve_config_path(cli.config.as_deref())?;
            let config = load_config(&path)?;
            run_auth(command, &config).await
        }
        Commands::Config { command } => {
            let path = resolve_config_path(cli.config.as_deref())?;
            run_config(command, &path)
        }
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}
