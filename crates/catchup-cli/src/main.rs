//! Catchup CLI - read AI-summarized tech news from the terminal
//!
//! Sessions are kept per profile in the OS keychain and refreshed on demand.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::articles::run_articles;
use crate::commands::auth_cmd::run_auth;
use crate::commands::config::run_config;
use crate::commands::sources::run_sources;
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

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catchup=info,catchup_core=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Auth { command } => run_auth(command, profile).await,
        Commands::Articles { command } => run_articles(command, profile).await,
        Commands::Sources { command } => run_sources(command, profile).await,
        Commands::Config { command } => run_config(command, profile),
    }
}
