//! Step executor
//!
//! Runs one [`Step`] against a session. Every kind either fully succeeds or
//! fails with a typed [`StepError`]. Actions that change the page (navigate,
//! fill, click) are followed by a settle wait on the document-ready signal.

use std::path::PathBuf;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::artifacts::ScenarioArtifacts;
use crate::config::Timing;
use crate::definition::{ElementDescriptor, Step, StepKind};
use crate::driver::{BrowserSession, ElementHandle};
use crate::error::{DriverError, StepError, StepResult};
use crate::locator::{not_found, Actionable, Hidden, TextContains, Visible};
use crate::wait::{
    wait_until, Condition, DocumentReady, Observation, UrlMatches, UrlPattern, WaitFailure, WaitOptions,
};

/// What a successful step produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Screenshot written by the step
    pub artifact: Option<PathBuf>,
}

/// Executes steps with a fixed base URL, timing and cancellation token
#[derive(Debug, Clone)]
pub struct StepExecutor {
    base_url: String,
    timing: Timing,
    cancel: CancellationToken,
}

impl StepExecutor {
    pub fn new(base_url: impl Into<String>, timing: Timing, cancel: CancellationToken) -> Self {
        Self {
            base_url: base_url.into(),
            timing,
            cancel,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Absolute URLs pass through; anything else is appended to the base URL
    ///
    /// Plain concatenation keeps hash-router paths such as `/app/#/login` intact.
    pub fn resolve_url(&self, value: &str) -> String {
        if url::Url::parse(value).is_ok() {
            return value.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            value.trim_start_matches('/')
        )
    }

    pub async fn execute(
        &self,
        step: &Step,
        index: usize,
        session: &mut dyn BrowserSession,
        artifacts: &ScenarioArtifacts,
    ) -> StepResult<StepOutcome> {
        step.validate()
            .map_err(|reason| StepError::InvalidStep { reason })?;
        if self.cancel.is_cancelled() {
            return Err(StepError::cancelled(step.label()));
        }

        let deadline = Instant::now() + step.timeout(self.timing.step_timeout);
        debug!(step = index, "Executing {}", step.label());

        match step.kind {
            StepKind::Navigate => {
                let url = self.resolve_url(value(step)?);
                debug!("Navigating to {}", url);
                session.goto(&url).await?;
                self.settle(session).await?;
            }
            StepKind::Fill => {
                let target = target(step)?;
                let text = value(step)?;
                let element = self
                    .actionable(target, session, deadline, |description, detail| {
                        StepError::NotFillable { description, detail }
                    })
                    .await?;
                self.fill(target, &element, text, session).await?;
                self.settle(session).await?;
            }
            StepKind::Click => {
                let target = target(step)?;
                let element = self
                    .actionable(target, session, deadline, |description, detail| {
                        StepError::NotInteractable { description, detail }
                    })
                    .await?;
                session.click(&element).await.map_err(|e| match e {
                    DriverError::Intercepted(detail) => StepError::NotInteractable {
                        description: target.description.clone(),
                        detail: format!("click intercepted: {}", detail),
                    },
                    DriverError::Detached(_) => StepError::NotInteractable {
                        description: target.description.clone(),
                        detail: "element detached before the click landed".to_string(),
                    },
                    other => other.into(),
                })?;
                self.settle(session).await?;
            }
            StepKind::WaitForVisible => {
                let condition = Visible {
                    descriptor: target(step)?,
                };
                self.wait(&condition, session, deadline).await?;
            }
            StepKind::WaitForHidden => {
                let condition = Hidden {
                    descriptor: target(step)?,
                };
                self.wait(&condition, session, deadline).await?;
            }
            StepKind::WaitForUrl => {
                let pattern = UrlPattern::parse(value(step)?)
                    .map_err(|reason| StepError::InvalidStep { reason })?;
                let url = self.wait(&UrlMatches { pattern }, session, deadline).await?;
                debug!("Reached {}", url);
            }
            StepKind::AssertText => {
                let descriptor = target(step)?;
                let expected = value(step)?;
                let condition = TextContains { descriptor, expected };
                let options = self.options_until(deadline);
                match wait_until(&condition, session, &options, &self.cancel).await {
                    Ok(_) => {}
                    Err(WaitFailure::Expired { last, .. }) => {
                        return Err(StepError::Assertion {
                            description: descriptor.description.clone(),
                            expected: expected.to_string(),
                            actual: match last {
                                Observation::Text(text) => Some(text),
                                _ => None,
                            },
                        });
                    }
                    Err(WaitFailure::Failed(e)) => return Err(e),
                }
            }
            StepKind::Screenshot => {
                let png = session.screenshot(step.full_page).await?;
                let path = artifacts.step_png(index, step.kind);
                artifacts.write(&path, &png).await?;
                debug!("Screenshot saved to {}", path.display());
                return Ok(StepOutcome {
                    artifact: Some(path),
                });
            }
        }

        Ok(StepOutcome::default())
    }

    fn options_until(&self, deadline: Instant) -> WaitOptions {
        self.timing
            .wait(deadline.saturating_duration_since(Instant::now()))
    }

    async fn wait<C: Condition>(
        &self,
        condition: &C,
        session: &mut dyn BrowserSession,
        deadline: Instant,
    ) -> StepResult<C::Output> {
        let options = self.options_until(deadline);
        wait_until(condition, session, &options, &self.cancel)
            .await
            .map_err(|failure| failure.into_step_error(&condition.describe(), &options))
    }

    /// Let the application settle after an action
    async fn settle(&self, session: &mut dyn BrowserSession) -> StepResult<()> {
        let options = self.timing.settle();
        wait_until(&DocumentReady, session, &options, &self.cancel)
            .await
            .map_err(|failure| failure.into_step_error("document ready", &options))
    }

    /// Resolve and wait until visible, enabled and uncovered
    ///
    /// Never found is `NotFound`; found but never actionable goes through `blocked`.
    async fn actionable(
        &self,
        target: &ElementDescriptor,
        session: &mut dyn BrowserSession,
        deadline: Instant,
        blocked: impl FnOnce(String, String) -> StepError,
    ) -> StepResult<ElementHandle> {
        let options = self.options_until(deadline);
        match wait_until(&Actionable { descriptor: target }, session, &options, &self.cancel).await {
            Ok(element) => Ok(element),
            Err(WaitFailure::Expired {
                last: Observation::Absent,
                ..
            }) => Err(not_found(target)),
            Err(WaitFailure::Expired { last, .. }) => {
                Err(blocked(target.description.clone(), last.to_string()))
            }
            Err(WaitFailure::Failed(e)) => Err(e),
        }
    }

    async fn fill(
        &self,
        target: &ElementDescriptor,
        element: &ElementHandle,
        text: &str,
        session: &mut dyn BrowserSession,
    ) -> StepResult<()> {
        let not_fillable = |detail: String| StepError::NotFillable {
            description: target.description.clone(),
            detail,
        };

        if !element.editable {
            return Err(not_fillable(format!("<{}> does not accept text input", element.tag_name)));
        }

        session.fill(element, text).await.map_err(|e| match e {
            DriverError::Detached(_) => not_fillable("element detached while typing".to_string()),
            DriverError::Script(detail) => not_fillable(detail),
            other => other.into(),
        })?;

        match session.refresh(element).await? {
            Some(after) => {
                let observed = after.value.unwrap_or(after.text);
                if observed == text {
                    Ok(())
                } else {
                    Err(not_fillable(format!(
                        "value reads back as {:?} instead of {:?}",
                        observed, text
                    )))
                }
            }
            None => Err(not_fillable("element detached after input".to_string())),
        }
    }
}

fn target(step: &Step) -> StepResult<&ElementDescriptor> {
    step.target.as_ref().ok_or_else(|| StepError::InvalidStep {
        reason: format!("{} requires a target", step.kind),
    })
}

fn value(step: &Step) -> StepResult<&str> {
    step.value.as_deref().ok_or_else(|| StepError::InvalidStep {
        reason: format!("{} requires a value", step.kind),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::definition::Strategy;
    use crate::driver::scripted::{DriverCall, FakeElement, ScriptedApp, ScriptedFactory};
    use crate::driver::SessionFactory;
    use crate::error::TimeoutReason;

    const BASE: &str = "http://app.test/app";

    fn executor() -> StepExecutor {
        let timing = Timing {
            step_timeout: Duration::from_millis(500),
            settle_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(50),
            max_poll_interval: Duration::from_millis(200),
        };
        StepExecutor::new(BASE, timing, CancellationToken::new())
    }

    fn form_page() -> Vec<FakeElement> {
        vec![
            FakeElement::input("email").placeholder("seu@email.com"),
            FakeElement::input("locked").placeholder("bloqueado").disabled(),
            FakeElement::input("stubborn").placeholder("teimoso").rejecting_input(),
            FakeElement::new("title", "h1").text("Entrar").selector("h1"),
            FakeElement::button("save", "Salvar").covered(),
            FakeElement::new("toast", "div").text("Salvo com sucesso").selector(".toast").hidden(),
        ]
    }

    async fn setup() -> (ScriptedFactory, Box<dyn BrowserSession>, tempfile::TempDir, ScenarioArtifacts) {
        let factory = ScriptedFactory::new(
            ScriptedApp::new()
                .route("http://app.test/app/#/login", form_page())
                .settle_polls(2),
        );
        let session = factory.open().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ScenarioArtifacts::new(dir.path().join("form"));
        (factory, session, dir, artifacts)
    }

    fn by_placeholder(description: &str, placeholder: &str) -> ElementDescriptor {
        ElementDescriptor::new(description, Strategy::placeholder(placeholder))
    }

    #[test]
    fn test_resolve_url() {
        let exec = executor();
        assert_eq!(exec.resolve_url("/#/login"), "http://app.test/app/#/login");
        assert_eq!(exec.resolve_url("#/login"), "http://app.test/app/#/login");
        assert_eq!(exec.resolve_url("https://other.test/x"), "https://other.test/x");
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_then_fill() {
        let (factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();

        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();
        exec.execute(
            &Step::fill(by_placeholder("email field", "seu@email.com"), "medico@clinica.com"),
            1,
            session.as_mut(),
            &artifacts,
        )
        .await
        .unwrap();

        assert_eq!(
            factory.recorder().actions(),
            vec![
                DriverCall::Goto("http://app.test/app/#/login".to_string()),
                DriverCall::Fill("email".to_string(), "medico@clinica.com".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fill_rejections() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let heading = Step::fill(ElementDescriptor::new("title", Strategy::css("h1")), "x");
        let err = exec.execute(&heading, 1, session.as_mut(), &artifacts).await.unwrap_err();
        assert!(matches!(err, StepError::NotFillable { ref detail, .. } if detail.contains("<h1>")));

        let locked = Step::fill(by_placeholder("locked field", "bloqueado"), "x");
        let err = exec.execute(&locked, 2, session.as_mut(), &artifacts).await.unwrap_err();
        assert!(matches!(err, StepError::NotFillable { ref detail, .. } if detail.contains("disabled")));

        let stubborn = Step::fill(by_placeholder("stubborn field", "teimoso"), "x");
        let err = exec.execute(&stubborn, 3, session.as_mut(), &artifacts).await.unwrap_err();
        assert!(matches!(err, StepError::NotFillable { ref detail, .. } if detail.contains("reads back")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_covered_is_not_interactable() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let click = Step::click(ElementDescriptor::new("save button", Strategy::role("button", "Salvar")));
        let err = exec.execute(&click, 1, session.as_mut(), &artifacts).await.unwrap_err();
        match err {
            StepError::NotInteractable { description, detail } => {
                assert_eq!(description, "save button");
                assert!(detail.contains("covered"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_missing_is_not_found() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let click = Step::click(ElementDescriptor::new("demo button", Strategy::text("Acesso Demo")));
        let err = exec.execute(&click, 1, session.as_mut(), &artifacts).await.unwrap_err();
        assert_eq!(err.kind_name(), "not_found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_visible_distinguishes_hidden_from_absent() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let hidden = Step::wait_for_visible(ElementDescriptor::new("toast", Strategy::css(".toast")));
        match exec.execute(&hidden, 1, session.as_mut(), &artifacts).await.unwrap_err() {
            StepError::Timeout { reason, .. } => assert_eq!(reason, TimeoutReason::HiddenTimeout),
            other => panic!("unexpected: {other:?}"),
        }

        let absent = Step::wait_for_visible(ElementDescriptor::new("modal", Strategy::css(".modal")));
        match exec.execute(&absent, 2, session.as_mut(), &artifacts).await.unwrap_err() {
            StepError::Timeout { reason, .. } => assert_eq!(reason, TimeoutReason::Absent),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_assert_text() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.execute(&Step::navigate("/#/login"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let heading = || ElementDescriptor::new("page title", Strategy::css("h1"));
        exec.execute(&Step::assert_text(heading(), "Entrar"), 1, session.as_mut(), &artifacts)
            .await
            .unwrap();

        let err = exec
            .execute(&Step::assert_text(heading(), "Painel"), 2, session.as_mut(), &artifacts)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StepError::Assertion {
                description: "page title".to_string(),
                expected: "Painel".to_string(),
                actual: Some("Entrar".to_string()),
            }
        );

        let missing = ElementDescriptor::new("subtitle", Strategy::css("h2"));
        let err = exec
            .execute(&Step::assert_text(missing, "x"), 3, session.as_mut(), &artifacts)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Assertion { actual: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_step_writes_artifact() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        let outcome = exec
            .execute(&Step::screenshot().full_page(), 4, session.as_mut(), &artifacts)
            .await
            .unwrap();
        let path = outcome.artifact.unwrap();
        assert!(path.ends_with("form/4-screenshot.png"));
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let (_factory, mut session, _dir, artifacts) = setup().await;
        let exec = executor();
        exec.cancellation().cancel();
        let err = exec
            .execute(&Step::navigate("/"), 0, session.as_mut(), &artifacts)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
