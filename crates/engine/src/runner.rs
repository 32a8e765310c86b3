//! Scenario runner
//!
//! Executes one scenario's steps strictly in order against a session it is
//! lent by the orchestrator. The runner never opens or closes sessions.

use std::fmt;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::artifacts::ScenarioArtifacts;
use crate::definition::{FailurePolicy, Scenario, Step, StepKind};
use crate::diagnostics::{DiagnosticCapturer, FailureContext};
use crate::driver::BrowserSession;
use crate::error::StepError;
use crate::executor::StepExecutor;
use crate::locator::{lookup, Lookup};
use crate::report::{FailureReason, RunResult, RunStatus, StepReport, StepStatus};

/// Lifecycle of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Passed => "passed",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Runs the steps of one scenario
pub struct ScenarioRunner {
    executor: StepExecutor,
    capturer: DiagnosticCapturer,
    state: RunState,
}

impl ScenarioRunner {
    pub fn new(executor: StepExecutor, capturer: DiagnosticCapturer) -> Self {
        Self {
            executor,
            capturer,
            state: RunState::Pending,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, scenario: &str, next: RunState) {
        debug!(scenario, "{} -> {}", self.state, next);
        self.state = next;
    }

    /// Run every step and produce the scenario's result
    pub async fn run(
        &mut self,
        scenario: &Scenario,
        session: &mut dyn BrowserSession,
        session_id: Option<Uuid>,
        artifacts: &ScenarioArtifacts,
    ) -> RunResult {
        let started_at = Utc::now();
        let start = Instant::now();
        self.transition(&scenario.name, RunState::Running);
        info!(scenario = %scenario.name, "Running {} step(s)", scenario.steps.len());

        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut artifact_paths = Vec::new();
        let mut failure: Option<FailureReason> = None;
        let mut failed_step_index = None;
        let mut halted = false;

        for (index, step) in scenario.steps.iter().enumerate() {
            if halted {
                steps.push(skipped(index, step));
                continue;
            }
            if failure.is_some() && !self.target_available(step, session).await {
                info!(scenario = %scenario.name, step = index, "Skipping {}: target not available", step.label());
                steps.push(skipped(index, step));
                continue;
            }

            let step_start = Instant::now();
            match self.executor.execute(step, index, session, artifacts).await {
                Ok(outcome) => {
                    debug!(scenario = %scenario.name, step = index, "✓ {}", step.label());
                    artifact_paths.extend(outcome.artifact.iter().cloned());
                    steps.push(StepReport {
                        index,
                        kind: step.kind,
                        label: step.label(),
                        status: StepStatus::Passed,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        error: None,
                        artifact: outcome.artifact,
                    });
                }
                Err(e) => {
                    warn!(scenario = %scenario.name, step = index, "✗ {} - {}", step.label(), e);
                    let diagnostics = self
                        .capturer
                        .capture_failure(
                            session,
                            artifacts,
                            FailureContext {
                                scenario: &scenario.name,
                                step_index: index,
                                step,
                                error: &e,
                            },
                        )
                        .await;
                    artifact_paths.extend(diagnostics.paths());
                    steps.push(StepReport {
                        index,
                        kind: step.kind,
                        label: step.label(),
                        status: StepStatus::Failed,
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        error: Some(e.clone()),
                        artifact: diagnostics.screenshot_path.clone(),
                    });

                    if failure.is_none() {
                        failed_step_index = Some(index);
                        failure = Some(diagnostics.into_failure_reason());
                    }
                    halted = halts(scenario.on_failure, &e);
                }
            }
        }

        let status = if failure.is_some() {
            self.transition(&scenario.name, RunState::Failed);
            RunStatus::Failed
        } else {
            self.transition(&scenario.name, RunState::Passed);
            RunStatus::Passed
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &failure {
            None => info!("✓ {} ({} ms)", scenario.name, duration_ms),
            Some(reason) => error!(
                "✗ {} - step {} failed: {}",
                scenario.name,
                failed_step_index.map_or_else(|| "?".to_string(), |i| i.to_string()),
                reason.error
            ),
        }

        RunResult {
            scenario_name: scenario.name.clone(),
            status,
            failed_step_index,
            failure_reason: failure,
            artifact_paths,
            steps,
            attempts: 1,
            duration_ms,
            session_id,
            started_at,
            retried_after: None,
        }
    }

    /// Non-waiting dependency check used after a failure under continue-and-record
    ///
    /// Steps without a target, and WaitForHidden (absence is its goal), always run.
    async fn target_available(&self, step: &Step, session: &mut dyn BrowserSession) -> bool {
        let target = match &step.target {
            Some(target) if step.kind != StepKind::WaitForHidden => target,
            _ => return true,
        };
        match lookup(target, session).await {
            Ok(Lookup::Found(_)) => true,
            Ok(Lookup::Absent) => false,
            Err(StepError::AmbiguousMatch { .. }) => false,
            // Let the step itself report anything else.
            Err(_) => true,
        }
    }
}

/// Whether a failure stops the remaining steps
fn halts(policy: FailurePolicy, error: &StepError) -> bool {
    match error {
        StepError::Cancelled { .. } | StepError::Session { .. } => true,
        _ => policy == FailurePolicy::Abort,
    }
}

fn skipped(index: usize, step: &Step) -> StepReport {
    StepReport {
        index,
        kind: step.kind,
        label: step.label(),
        status: StepStatus::Skipped,
        duration_ms: 0,
        error: None,
        artifact: None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::Timing;
    use crate::definition::{ElementDescriptor, Strategy};
    use crate::driver::scripted::{DriverCall, FakeElement, ScriptedApp, ScriptedFactory};
    use crate::driver::SessionFactory;

    const HOME: &str = "http://app.test/";

    fn runner() -> ScenarioRunner {
        let timing = Timing {
            step_timeout: Duration::from_millis(300),
            ..Timing::default()
        };
        ScenarioRunner::new(
            StepExecutor::new("http://app.test", timing, CancellationToken::new()),
            DiagnosticCapturer::default(),
        )
    }

    fn app() -> ScriptedApp {
        ScriptedApp::new().route(
            HOME,
            vec![
                FakeElement::button("new", "Novo Paciente")
                    .on_click(|page| page.show("modal")),
                FakeElement::new("modal", "div").role("dialog").hidden(),
                FakeElement::button("close", "Fechar").inside("modal"),
            ],
        )
    }

    fn button(text: &str) -> ElementDescriptor {
        ElementDescriptor::new(format!("{} button", text), Strategy::role("button", text))
    }

    #[test]
    fn test_halting_rules() {
        assert!(halts(FailurePolicy::Abort, &StepError::session("gone")));
        assert!(halts(FailurePolicy::ContinueAndRecord, &StepError::session("gone")));
        assert!(halts(FailurePolicy::ContinueAndRecord, &StepError::cancelled("waiting")));
        assert!(!halts(
            FailurePolicy::ContinueAndRecord,
            &StepError::NotFound { description: "x".into(), strategies: 1 }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_passing_scenario() {
        let factory = ScriptedFactory::new(app());
        let mut session = factory.open().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let scenario = Scenario::new(
            "patient-modal",
            vec![
                Step::navigate("/"),
                Step::click(button("Novo Paciente")),
                Step::wait_for_visible(ElementDescriptor::new("modal", Strategy::Role { role: "dialog".into(), name: None })),
                Step::screenshot(),
            ],
        );

        let mut runner = runner();
        assert_eq!(runner.state(), RunState::Pending);
        let result = runner
            .run(&scenario, session.as_mut(), None, &ScenarioArtifacts::new(dir.path()))
            .await;

        assert_eq!(runner.state(), RunState::Passed);
        assert_eq!(result.status, RunStatus::Passed);
        assert!(result.failed_step_index.is_none());
        assert_eq!(result.artifact_paths.len(), 1);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Passed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_at_first_failure() {
        let factory = ScriptedFactory::new(app());
        let recorder = factory.recorder();
        let mut session = factory.open().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let scenario = Scenario::new(
            "broken",
            vec![
                Step::navigate("/"),
                Step::click(button("Excluir")),
                Step::click(button("Novo Paciente")),
            ],
        );

        let mut runner = runner();
        let result = runner
            .run(&scenario, session.as_mut(), None, &ScenarioArtifacts::new(dir.path()))
            .await;

        assert_eq!(runner.state(), RunState::Failed);
        assert_eq!(result.failed_step_index, Some(1));
        assert_eq!(result.steps[2].status, StepStatus::Skipped);
        assert!(!recorder.actions().contains(&DriverCall::Click("new".to_string())));

        let reason = result.failure_reason.unwrap();
        assert_eq!(reason.step_kind, Some(StepKind::Click));
        assert_eq!(reason.target.as_deref(), Some("Excluir button"));
        assert!(reason.screenshot.unwrap().ends_with("1-click.png"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_and_record_skips_unavailable_targets() {
        let factory = ScriptedFactory::new(app());
        let recorder = factory.recorder();
        let mut session = factory.open().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let scenario = Scenario::new(
            "keep-going",
            vec![
                Step::navigate("/"),
                Step::click(button("Excluir")),
                Step::click(button("Confirmar")),
                Step::click(button("Novo Paciente")),
                Step::wait_for_hidden(ElementDescriptor::new("toast", Strategy::css(".toast"))),
            ],
        )
        .with_policy(FailurePolicy::ContinueAndRecord);

        let result = runner()
            .run(&scenario, session.as_mut(), None, &ScenarioArtifacts::new(dir.path()))
            .await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.failed_step_index, Some(1));
        let statuses: Vec<_> = result.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                StepStatus::Passed,
                StepStatus::Failed,
                StepStatus::Skipped,
                StepStatus::Passed,
                StepStatus::Passed,
            ]
        );
        assert!(recorder.actions().contains(&DriverCall::Click("new".to_string())));
    }
}
