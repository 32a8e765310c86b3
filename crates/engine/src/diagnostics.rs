//! Failure diagnostics
//!
//! Capturing never fails: anything that cannot be collected (browser gone,
//! disk full) is noted in the artifact and the original step error is left
//! untouched for the caller to report.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::artifacts::ScenarioArtifacts;
use crate::definition::{Step, StepKind};
use crate::driver::BrowserSession;
use crate::error::StepError;
use crate::report::FailureReason;

/// Bound for each individual capture call
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

/// What was being done when the failure happened
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub scenario: &'a str,
    pub step_index: usize,
    pub step: &'a Step,
    pub error: &'a StepError,
}

/// Everything known about one failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticArtifact {
    pub scenario: String,
    pub step_index: usize,
    pub step_kind: StepKind,
    pub target: Option<String>,
    pub error: StepError,
    pub url: Option<String>,
    pub screenshot_path: Option<PathBuf>,
    pub screenshot_sha256: Option<String>,
    pub report_path: Option<PathBuf>,
    /// One entry per diagnostic that could not be captured
    pub unavailable: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

impl DiagnosticArtifact {
    pub fn note(&self) -> Option<String> {
        if self.unavailable.is_empty() {
            None
        } else {
            Some(format!("diagnostics unavailable: {}", self.unavailable.join("; ")))
        }
    }

    /// Files written, in order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.screenshot_path
            .iter()
            .chain(self.report_path.iter())
            .cloned()
            .collect()
    }

    pub fn into_failure_reason(self) -> FailureReason {
        let diagnostics_note = self.note();
        FailureReason {
            step_index: Some(self.step_index),
            step_kind: Some(self.step_kind),
            target: self.target,
            error: self.error,
            url: self.url,
            screenshot: self.screenshot_path,
            report: self.report_path,
            diagnostics_note,
        }
    }
}

/// Captures screenshot, URL and error details after a failed step
#[derive(Debug, Clone)]
pub struct DiagnosticCapturer {
    timeout: Duration,
}

impl Default for DiagnosticCapturer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_TIMEOUT)
    }
}

impl DiagnosticCapturer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn capture_failure(
        &self,
        session: &mut dyn BrowserSession,
        artifacts: &ScenarioArtifacts,
        context: FailureContext<'_>,
    ) -> DiagnosticArtifact {
        let mut artifact = DiagnosticArtifact {
            scenario: context.scenario.to_string(),
            step_index: context.step_index,
            step_kind: context.step.kind,
            target: context.step.target_description().map(str::to_string),
            error: context.error.clone(),
            url: None,
            screenshot_path: None,
            screenshot_sha256: None,
            report_path: None,
            unavailable: Vec::new(),
            captured_at: Utc::now(),
        };

        match tokio::time::timeout(self.timeout, session.current_url()).await {
            Ok(Ok(url)) => artifact.url = Some(url),
            Ok(Err(e)) => artifact.unavailable.push(format!("url: {}", e)),
            Err(_) => artifact.unavailable.push("url: timed out".to_string()),
        }

        match tokio::time::timeout(self.timeout, session.screenshot(true)).await {
            Ok(Ok(png)) => {
                let path = artifacts.step_png(context.step_index, context.step.kind);
                match artifacts.write(&path, &png).await {
                    Ok(()) => {
                        artifact.screenshot_sha256 = Some(hex::encode(Sha256::digest(&png)));
                        artifact.screenshot_path = Some(path);
                    }
                    Err(e) => artifact.unavailable.push(format!("screenshot write: {}", e)),
                }
            }
            Ok(Err(e)) => artifact.unavailable.push(format!("screenshot: {}", e)),
            Err(_) => artifact.unavailable.push("screenshot: timed out".to_string()),
        }

        let report_path = artifacts.failure_json(context.step_index, context.step.kind);
        artifact.report_path = Some(report_path.clone());
        let written = match serde_json::to_vec_pretty(&artifact) {
            Ok(json) => artifacts.write(&report_path, &json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            artifact.report_path = None;
            artifact.unavailable.push(format!("report: {}", e));
        }

        match artifact.note() {
            Some(note) => warn!(
                scenario = context.scenario,
                step = context.step_index,
                "Partial diagnostics: {}",
                note
            ),
            None => debug!(
                scenario = context.scenario,
                step = context.step_index,
                "Diagnostics captured"
            ),
        }
        artifact
    }
}
