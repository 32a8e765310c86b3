//! Run orchestrator
//!
//! Owns every browser session of a run. Sessions are opened here, lent to a
//! [`ScenarioRunner`], and closed here on every path, including a panic
//! inside the runner and cancellation of the run.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::artifacts::ArtifactDir;
use crate::config::{Isolation, RunConfig};
use crate::definition::Scenario;
use crate::diagnostics::DiagnosticCapturer;
use crate::driver::{SessionFactory, SessionHandle};
use crate::error::{ProbeResult, StepError};
use crate::executor::StepExecutor;
use crate::report::{write_results, RunResult, SuiteSummary};
use crate::runner::ScenarioRunner;

/// Runs a batch of scenarios under one configuration
pub struct Orchestrator {
    config: RunConfig,
    factory: Arc<dyn SessionFactory>,
    artifacts: ArtifactDir,
    capturer: DiagnosticCapturer,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: RunConfig, factory: Arc<dyn SessionFactory>) -> Self {
        let artifacts = ArtifactDir::new(config.artifact_dir.clone());
        Self {
            config,
            factory,
            artifacts,
            capturer: DiagnosticCapturer::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled on Ctrl-C
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_capturer(mut self, capturer: DiagnosticCapturer) -> Self {
        self.capturer = capturer;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run all scenarios; results keep the input order
    ///
    /// Errors only for invalid input or when results.json cannot be written.
    /// Scenario failures are reported in the results.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> ProbeResult<Vec<RunResult>> {
        self.config.validate()?;
        for scenario in scenarios {
            scenario.validate()?;
        }
        Scenario::ensure_distinct(scenarios)?;

        let start = Instant::now();
        let run_cancel = self.cancel.child_token();
        let watchdog = {
            let token = run_cancel.clone();
            let budget = self.config.overall_timeout();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(budget) => {
                        warn!("Overall timeout of {} ms exceeded, cancelling run", budget.as_millis());
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        };

        info!(
            "Running {} scenario(s) with {:?} isolation",
            scenarios.len(),
            self.config.isolation
        );
        let results = match self.config.isolation {
            Isolation::Shared => self.run_shared(scenarios, &run_cancel).await,
            Isolation::PerScenario => self.run_isolated(scenarios, &run_cancel).await,
        };
        watchdog.abort();

        let summary = SuiteSummary::from_results(&results, start.elapsed().as_millis() as u64);
        info!(
            "Results: {} passed, {} failed, {} retried ({} ms)",
            summary.passed, summary.failed, summary.retried, summary.duration_ms
        );

        write_results(&self.artifacts.results_path(), &results)?;
        Ok(results)
    }

    /// Fresh session per scenario, at most `parallelism` at once
    async fn run_isolated(&self, scenarios: &[Scenario], cancel: &CancellationToken) -> Vec<RunResult> {
        stream::iter(scenarios)
            .map(|scenario| self.run_with_retry(scenario, cancel))
            .buffered(self.config.parallelism.max(1))
            .collect()
            .await
    }

    /// One session for everything, scenarios strictly sequential
    ///
    /// A session that broke is replaced before the next scenario.
    async fn run_shared(&self, scenarios: &[Scenario], cancel: &CancellationToken) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(scenarios.len());
        let mut shared: Option<SessionHandle> = None;

        for scenario in scenarios {
            if cancel.is_cancelled() {
                results.push(not_started(scenario));
                continue;
            }

            if shared.is_none() {
                match SessionHandle::open(self.factory.as_ref()).await {
                    Ok(handle) => shared = Some(handle),
                    Err(e) => {
                        error!("✗ {} - could not open session: {}", scenario.name, e);
                        results.push(RunResult::session_failure(
                            &scenario.name,
                            StepError::session(format!("could not open session: {}", e)),
                            Utc::now(),
                        ));
                        continue;
                    }
                }
            }
            let Some(handle) = shared.as_mut() else {
                continue;
            };

            let mut result = self.run_guarded(scenario, handle, 1, cancel).await;
            if broke_session(&result) {
                if let Some(handle) = shared.take() {
                    let _ = handle.close().await;
                }
            }

            if self.should_retry(&result, cancel) {
                info!("Retrying {} on a fresh session", scenario.name);
                let second = self.attempt_fresh(scenario, 2, cancel).await;
                result = merge_retry(result, second);
            }
            results.push(result);
        }

        if let Some(handle) = shared {
            let _ = handle.close().await;
        }
        results
    }

    async fn run_with_retry(&self, scenario: &Scenario, cancel: &CancellationToken) -> RunResult {
        let first = self.attempt_fresh(scenario, 1, cancel).await;
        if !self.should_retry(&first, cancel) {
            return first;
        }
        info!("Retrying {} on a fresh session", scenario.name);
        let second = self.attempt_fresh(scenario, 2, cancel).await;
        merge_retry(first, second)
    }

    fn should_retry(&self, result: &RunResult, cancel: &CancellationToken) -> bool {
        self.config.retry_on_failure && !result.passed() && !cancel.is_cancelled()
    }

    /// Open a session, run, close the session
    async fn attempt_fresh(&self, scenario: &Scenario, attempt: u32, cancel: &CancellationToken) -> RunResult {
        if cancel.is_cancelled() {
            return not_started(scenario);
        }

        let started_at = Utc::now();
        let mut handle = match SessionHandle::open(self.factory.as_ref()).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("✗ {} - could not open session: {}", scenario.name, e);
                return RunResult::session_failure(
                    &scenario.name,
                    StepError::session(format!("could not open session: {}", e)),
                    started_at,
                );
            }
        };

        let result = self.run_guarded(scenario, &mut handle, attempt, cancel).await;
        let _ = handle.close().await;
        result
    }

    /// Run one scenario on a lent session; a panic becomes a failed result
    async fn run_guarded(
        &self,
        scenario: &Scenario,
        handle: &mut SessionHandle,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> RunResult {
        let started_at = Utc::now();
        let session_id = handle.id();
        let artifacts = self.artifacts.scenario(&scenario.name, attempt);
        let executor = StepExecutor::new(&self.config.base_url, self.config.timing(), cancel.clone());
        let mut runner = ScenarioRunner::new(executor, self.capturer.clone());

        let span = info_span!("scenario", name = %scenario.name, session = %session_id, attempt);
        let run = runner.run(scenario, handle.driver(), Some(session_id), &artifacts);

        match AssertUnwindSafe(run).catch_unwind().instrument(span).await {
            Ok(mut result) => {
                result.attempts = attempt;
                result
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("✗ {} - scenario panicked: {}", scenario.name, message);
                let mut result = RunResult::session_failure(
                    &scenario.name,
                    StepError::session(format!("scenario panicked: {}", message)),
                    started_at,
                );
                result.session_id = Some(session_id);
                result.attempts = attempt;
                result
            }
        }
    }
}

/// The session cannot be trusted for another scenario
///
/// Any session error counts, not only the first failure: under
/// continue-and-record it may follow an ordinary step failure.
fn broke_session(result: &RunResult) -> bool {
    result
        .failure_reason
        .iter()
        .map(|r| &r.error)
        .chain(result.steps.iter().filter_map(|s| s.error.as_ref()))
        .any(|e| matches!(e, StepError::Session { .. }))
}

fn not_started(scenario: &Scenario) -> RunResult {
    RunResult::session_failure(
        &scenario.name,
        StepError::cancelled("waiting to start"),
        Utc::now(),
    )
}

/// Second attempt's result, carrying the first failure and all artifacts
fn merge_retry(first: RunResult, mut second: RunResult) -> RunResult {
    let mut artifact_paths = first.artifact_paths;
    artifact_paths.append(&mut second.artifact_paths);
    second.artifact_paths = artifact_paths;
    second.attempts = 2;
    second.retried_after = first.failure_reason;
    second.duration_ms += first.duration_ms;
    second.started_at = first.started_at;
    second
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
