//! uiprobe CLI - Main Entry Point
//!
//! Exit codes: 0 all scenarios passed, 1 a scenario failed, 2 fatal error.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use uiprobe_cli::cli::Cli;
use uiprobe_cli::output::print_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match uiprobe_cli::execute(cli).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
