//! Error types for uiprobe
//!
//! Three layers:
//! - [`DriverError`]: failures reported by the browser automation seam
//! - [`StepError`]: the failure taxonomy of a single step, serialized into results
//! - [`ProbeError`]: loading, configuration and I/O failures of the engine itself

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a bounded wait gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutReason {
    /// The element never appeared in the document
    Absent,
    /// The element was present but never became visible
    HiddenTimeout,
    /// The element stayed visible while waiting for it to disappear
    StillVisible,
    /// The current URL never matched the expected pattern
    UrlMismatch,
    /// The document never reported ready after an action
    NotSettled,
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutReason::Absent => "absent",
            TimeoutReason::HiddenTimeout => "present but hidden",
            TimeoutReason::StillVisible => "still visible",
            TimeoutReason::UrlMismatch => "url mismatch",
            TimeoutReason::NotSettled => "document not settled",
        };
        f.write_str(s)
    }
}

/// Failure of one step
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("Element not found: {description} ({strategies} strategies tried)")]
    NotFound { description: String, strategies: usize },

    #[error("Ambiguous match for {description}: {count} elements matched")]
    AmbiguousMatch { description: String, count: usize },

    #[error("Timed out after {timeout_ms} ms waiting for {waiting_for} ({reason}; last observed: {last_observed})")]
    Timeout {
        waiting_for: String,
        timeout_ms: u64,
        reason: TimeoutReason,
        last_observed: String,
    },

    #[error("Element not fillable: {description} - {detail}")]
    NotFillable { description: String, detail: String },

    #[error("Element not interactable: {description} - {detail}")]
    NotInteractable { description: String, detail: String },

    #[error("Assertion failed on {description}: expected text {expected:?}, {}", describe_actual(.actual))]
    Assertion {
        description: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Cancelled while {during}")]
    Cancelled { during: String },

    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Invalid step: {reason}")]
    InvalidStep { reason: String },
}

fn describe_actual(actual: &Option<String>) -> String {
    match actual {
        Some(text) => format!("found {:?}", text),
        None => "element not found".to_string(),
    }
}

impl StepError {
    pub fn session(message: impl Into<String>) -> Self {
        StepError::Session {
            message: message.into(),
        }
    }

    pub fn cancelled(during: impl Into<String>) -> Self {
        StepError::Cancelled {
            during: during.into(),
        }
    }

    /// Short machine-readable name of the variant
    pub fn kind_name(&self) -> &'static str {
        match self {
            StepError::NotFound { .. } => "not_found",
            StepError::AmbiguousMatch { .. } => "ambiguous_match",
            StepError::Timeout { .. } => "timeout",
            StepError::NotFillable { .. } => "not_fillable",
            StepError::NotInteractable { .. } => "not_interactable",
            StepError::Assertion { .. } => "assertion",
            StepError::Session { .. } => "session",
            StepError::Cancelled { .. } => "cancelled",
            StepError::Io { .. } => "io",
            StepError::InvalidStep { .. } => "invalid_step",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled { .. })
    }
}

impl From<DriverError> for StepError {
    fn from(e: DriverError) -> Self {
        StepError::session(e.to_string())
    }
}

impl From<std::io::Error> for StepError {
    fn from(e: std::io::Error) -> Self {
        StepError::Io {
            message: e.to_string(),
        }
    }
}

pub type StepResult<T> = Result<T, StepError>;

/// Failure reported by a browser driver
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser session is closed")]
    Closed,

    #[error("Element {0} is no longer attached to the document")]
    Detached(String),

    #[error("Click on {0} was intercepted by another element")]
    Intercepted(String),

    #[error("Script error: {0}")]
    Script(String),

    /// The page navigated while a script was running
    #[error("Execution context lost: {0}")]
    ContextLost(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Engine-level failure outside of step execution
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Scenario parse error in {source_name}: {message}")]
    ScenarioParse { source_name: String, message: String },

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Environment variable not set: {0}")]
    MissingEnv(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No scenarios found in {0}")]
    NoScenarios(String),

    #[error("Session error: {0}")]
    Session(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
