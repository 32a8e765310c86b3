//! Run results

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::definition::StepKind;
use crate::error::{ProbeResult, StepError};

/// Final status of one scenario execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not executed: after an abort, or its target was gone under continue-and-record
    Skipped,
}

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub kind: StepKind,
    pub label: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    /// Screenshot written by this step, or on its failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Structured account of the first failure of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    /// `None` when the session could not be established
    pub step_index: Option<usize>,
    pub step_kind: Option<StepKind>,
    /// Description of the step's target element
    pub target: Option<String>,
    pub error: StepError,
    /// URL at the time of failure
    #[serde(default)]
    pub url: Option<String>,
    pub screenshot: Option<PathBuf>,
    #[serde(default)]
    pub report: Option<PathBuf>,
    /// Set when diagnostics could not be captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics_note: Option<String>,
}

impl FailureReason {
    /// A failure outside any step
    pub fn without_step(error: StepError) -> Self {
        Self {
            step_index: None,
            step_kind: None,
            target: None,
            error,
            url: None,
            screenshot: None,
            report: None,
            diagnostics_note: None,
        }
    }
}

/// Result of one scenario execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub scenario_name: String,
    pub status: RunStatus,
    pub failed_step_index: Option<usize>,
    pub failure_reason: Option<FailureReason>,
    /// Artifacts in the order they were written
    pub artifact_paths: Vec<PathBuf>,
    pub steps: Vec<StepReport>,
    /// 2 when the scenario was retried
    pub attempts: u32,
    pub duration_ms: u64,
    pub session_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    /// First attempt's failure when a retry happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retried_after: Option<FailureReason>,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Passed
    }

    /// Result for a scenario whose session could not be used at all
    pub fn session_failure(scenario_name: &str, error: StepError, started_at: DateTime<Utc>) -> Self {
        Self {
            scenario_name: scenario_name.to_string(),
            status: RunStatus::Failed,
            failed_step_index: None,
            failure_reason: Some(FailureReason::without_step(error)),
            artifact_paths: Vec::new(),
            steps: Vec::new(),
            attempts: 1,
            duration_ms: (Utc::now() - started_at).num_milliseconds().max(0) as u64,
            session_id: None,
            started_at,
            retried_after: None,
        }
    }
}

/// Totals over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Scenarios that needed a second attempt
    pub retried: usize,
    pub duration_ms: u64,
}

impl SuiteSummary {
    pub fn from_results(results: &[RunResult], duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            retried: results.iter().filter(|r| r.attempts > 1).count(),
            duration_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Write the ordered results array as pretty JSON
pub fn write_results(path: &Path, results: &[RunResult]) -> ProbeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(path, json)?;
    info!("Results written to: {}", path.display());
    Ok(())
}
