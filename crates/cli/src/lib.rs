//! uiprobe CLI
//!
//! Runs, validates and lists UI scenarios.

pub mod cli;
pub mod commands;
pub mod output;

use anyhow::Result;

use cli::{Cli, Commands};

/// Dispatch a parsed command line; `Ok(false)` means at least one scenario failed
pub async fn execute(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.format).await,
        Commands::Validate(select) => commands::validate::execute(select, cli.format),
        Commands::List(select) => commands::list::execute(select, cli.format),
    }
}
