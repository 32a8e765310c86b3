//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uiprobe_engine::config::{Isolation, RunConfig};

use crate::output::OutputFormat;

/// uiprobe - declarative UI verification for single-page web applications
#[derive(Parser, Debug)]
#[command(name = "uiprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios against a browser
    Run(RunArgs),

    /// Load and validate scenarios without a browser
    Validate(SelectArgs),

    /// List scenarios
    List(SelectArgs),
}

/// Which scenarios to load
#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// Scenario files or directories (searched recursively for *.yaml / *.yml)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Only scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only the scenario with this name
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// TOML run configuration; flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run without a browser window
    #[arg(long, conflicts_with = "headed")]
    pub headless: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Prefix for relative navigate targets
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Session isolation: shared or per-scenario
    #[arg(long)]
    pub isolation: Option<Isolation>,

    /// Retry a failed scenario once on a fresh session
    #[arg(long)]
    pub retry_on_failure: bool,

    /// Wall-clock budget for the whole run
    #[arg(long)]
    pub overall_timeout_ms: Option<u64>,

    /// Where screenshots, failure reports and results.json go
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Concurrent sessions under per-scenario isolation
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Default step timeout
    #[arg(long)]
    pub step_timeout_ms: Option<u64>,

    /// Chrome/Chromium executable
    #[arg(long, env = "CHROME_BIN")]
    pub chrome: Option<PathBuf>,
}

impl RunArgs {
    /// Configuration file (or defaults) with flags applied on top
    pub fn resolve_config(&self) -> uiprobe_engine::ProbeResult<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut RunConfig) {
        if self.headless {
            config.headless = true;
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(isolation) = self.isolation {
            config.isolation = isolation;
        }
        if self.retry_on_failure {
            config.retry_on_failure = true;
        }
        if let Some(ms) = self.overall_timeout_ms {
            config.overall_timeout_ms = ms;
        }
        if let Some(dir) = &self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        if let Some(parallelism) = self.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(ms) = self.step_timeout_ms {
            config.step_timeout_ms = ms;
        }
        if let Some(chrome) = &self.chrome {
            config.chrome_executable = Some(chrome.clone());
        }
    }
}
