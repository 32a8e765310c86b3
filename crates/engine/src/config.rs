//! Run configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::definition::DEFAULT_STEP_TIMEOUT_MS;
use crate::error::{ProbeError, ProbeResult};
use crate::wait::WaitOptions;

/// How scenarios share browser sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// One session, scenarios strictly sequential
    Shared,
    /// Fresh session per scenario, bounded concurrency
    #[default]
    #[serde(alias = "per-scenario")]
    PerScenario,
}

impl std::str::FromStr for Isolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Isolation::Shared),
            "per-scenario" | "per_scenario" => Ok(Isolation::PerScenario),
            other => Err(format!("unknown isolation mode '{}'", other)),
        }
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Configuration for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Run the browser without a window
    pub headless: bool,

    /// Prefix for relative navigate targets
    pub base_url: String,

    pub isolation: Isolation,

    /// Retry a failed scenario once on a fresh session
    pub retry_on_failure: bool,

    /// Wall-clock budget for the whole run
    pub overall_timeout_ms: u64,

    /// Screenshots, failure reports and results.json
    pub artifact_dir: PathBuf,

    /// Default timeout of steps without their own
    pub step_timeout_ms: u64,

    /// First poll interval of every wait
    pub poll_interval_ms: u64,

    /// Backoff ceiling
    pub max_poll_interval_ms: u64,

    /// Budget for the document to settle after an action
    pub settle_timeout_ms: u64,

    /// Concurrent sessions under per-scenario isolation
    pub parallelism: usize,

    pub viewport: Viewport,

    /// Browser binary; `CHROME_BIN` or auto-detection otherwise
    pub chrome_executable: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            headless: true,
            base_url: "http://localhost:5173".to_string(),
            isolation: Isolation::PerScenario,
            retry_on_failure: false,
            overall_timeout_ms: 600_000,
            artifact_dir: PathBuf::from("uiprobe-artifacts"),
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            poll_interval_ms: 100,
            max_poll_interval_ms: 1_000,
            settle_timeout_ms: 10_000,
            parallelism: 4,
            viewport: Viewport::default(),
            chrome_executable: None,
        }
    }
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> ProbeResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> ProbeResult<()> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| ProbeError::InvalidConfig(format!("base_url '{}': {}", self.base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https" | "file") {
            return Err(ProbeError::InvalidConfig(format!(
                "base_url '{}' must be http(s) or file",
                self.base_url
            )));
        }
        if self.parallelism == 0 {
            return Err(ProbeError::InvalidConfig("parallelism must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::InvalidConfig("poll_interval_ms must be positive".to_string()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ProbeError::InvalidConfig("viewport must be non-empty".to_string()));
        }
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            step_timeout: Duration::from_millis(self.step_timeout_ms),
            settle_timeout: Duration::from_millis(self.settle_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_interval: Duration::from_millis(self.max_poll_interval_ms),
        }
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

/// Wait timings derived from a [`RunConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub step_timeout: Duration,
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
}

impl Timing {
    pub fn wait(&self, timeout: Duration) -> WaitOptions {
        WaitOptions::new(timeout).with_poll_interval(self.poll_interval, self.max_poll_interval)
    }

    pub fn settle(&self) -> WaitOptions {
        self.wait(self.settle_timeout)
    }
}

impl Default for Timing {
    fn default() -> Self {
        RunConfig::default().timing()
    }
}
