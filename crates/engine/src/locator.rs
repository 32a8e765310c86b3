//! Locator resolver
//!
//! Turns an [`ElementDescriptor`] into exactly one live element. Strategies
//! are tried in order (primary, then fallbacks) and the first one that
//! matches anything wins. Several matches are narrowed to the visible ones;
//! if that does not leave exactly one, the descriptor's explicit `nth` picks
//! by document order, and without it the lookup fails as ambiguous.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::definition::ElementDescriptor;
use crate::driver::{BrowserSession, ElementHandle};
use crate::error::{DriverError, StepError, StepResult};
use crate::wait::{wait_until, Check, Condition, Observation, WaitFailure, WaitOptions};

/// Outcome of a single non-waiting lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(ElementHandle),
    Absent,
}

/// Raw matches of the first strategy that matched anything
///
/// `None` when nothing matched or the `within` container is absent.
async fn candidates(
    descriptor: &ElementDescriptor,
    session: &mut dyn BrowserSession,
) -> StepResult<Option<(usize, Vec<ElementHandle>)>> {
    let scope = match &descriptor.within {
        Some(container) => match lookup(container, session).await? {
            Lookup::Found(element) => Some(element),
            Lookup::Absent => return Ok(None),
        },
        None => None,
    };

    for (index, strategy) in descriptor.strategies().enumerate() {
        let matches = match session.query(strategy, scope.as_ref()).await {
            Ok(matches) => matches,
            // Document swapped during the query; the next poll sees the new one.
            Err(DriverError::ContextLost(_)) => return Ok(None),
            Err(DriverError::Script(detail)) => {
                return Err(StepError::InvalidStep {
                    reason: format!(
                        "{}: strategy {} cannot be evaluated: {}",
                        descriptor.description, strategy, detail
                    ),
                })
            }
            Err(e) => return Err(e.into()),
        };
        trace!("{} via {}: {} match(es)", descriptor.description, strategy, matches.len());
        if !matches.is_empty() {
            return Ok(Some((index, matches)));
        }
    }
    Ok(None)
}

/// Apply visibility narrowing and the explicit `nth` pick
pub fn disambiguate(descriptor: &ElementDescriptor, matches: Vec<ElementHandle>) -> StepResult<Lookup> {
    let total = matches.len();
    if total == 0 {
        return Ok(Lookup::Absent);
    }
    if total == 1 {
        return Ok(matches.into_iter().next().map_or(Lookup::Absent, Lookup::Found));
    }

    let visible: Vec<ElementHandle> = matches.iter().filter(|e| e.visible).cloned().collect();
    if visible.len() == 1 {
        return Ok(visible.into_iter().next().map_or(Lookup::Absent, Lookup::Found));
    }

    match descriptor.nth {
        Some(n) => {
            let pool = if visible.is_empty() { matches } else { visible };
            // Fewer matches than requested: the list may still be rendering.
            Ok(pool.into_iter().nth(n).map_or(Lookup::Absent, Lookup::Found))
        }
        None => Err(StepError::AmbiguousMatch {
            description: descriptor.description.clone(),
            count: total,
        }),
    }
}

/// One resolution pass with no waiting
pub fn lookup<'a>(
    descriptor: &'a ElementDescriptor,
    session: &'a mut dyn BrowserSession,
) -> BoxFuture<'a, StepResult<Lookup>> {
    async move {
        match candidates(descriptor, session).await? {
            Some((index, matches)) => {
                let found = disambiguate(descriptor, matches)?;
                if index > 0 {
                    if let Lookup::Found(element) = &found {
                        debug!(
                            "{} resolved by fallback #{} to <{}> {}",
                            descriptor.description, index, element.tag_name, element.id
                        );
                    }
                }
                Ok(found)
            }
            None => Ok(Lookup::Absent),
        }
    }
    .boxed()
}

/// Resolve to exactly one element, polling until it exists
pub async fn resolve(
    descriptor: &ElementDescriptor,
    session: &mut dyn BrowserSession,
    options: &WaitOptions,
    cancel: &CancellationToken,
) -> StepResult<ElementHandle> {
    match wait_until(&Present { descriptor }, session, options, cancel).await {
        Ok(element) => Ok(element),
        Err(WaitFailure::Expired { .. }) => Err(not_found(descriptor)),
        Err(WaitFailure::Failed(e)) => Err(e),
    }
}

pub(crate) fn not_found(descriptor: &ElementDescriptor) -> StepError {
    StepError::NotFound {
        description: descriptor.description.clone(),
        strategies: descriptor.strategy_count(),
    }
}

/// The descriptor resolves to one element, visible or not
pub struct Present<'a> {
    pub descriptor: &'a ElementDescriptor,
}

#[async_trait]
impl Condition for Present<'_> {
    type Output = ElementHandle;

    fn describe(&self) -> String {
        format!("element: {}", self.descriptor.description)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<ElementHandle>> {
        Ok(match lookup(self.descriptor, session).await? {
            Lookup::Found(element) => Check::Met(element),
            Lookup::Absent => Check::Pending(Observation::Absent),
        })
    }
}

/// The element is visible
pub struct Visible<'a> {
    pub descriptor: &'a ElementDescriptor,
}

#[async_trait]
impl Condition for Visible<'_> {
    type Output = ElementHandle;

    fn describe(&self) -> String {
        format!("visible: {}", self.descriptor.description)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<ElementHandle>> {
        Ok(match lookup(self.descriptor, session).await? {
            Lookup::Found(element) if element.visible => Check::Met(element),
            Lookup::Found(_) => Check::Pending(Observation::Hidden),
            Lookup::Absent => Check::Pending(Observation::Absent),
        })
    }
}

/// Nothing matching the descriptor is visible
///
/// Ambiguity does not apply here: every match has to be gone or hidden.
pub struct Hidden<'a> {
    pub descriptor: &'a ElementDescriptor,
}

#[async_trait]
impl Condition for Hidden<'_> {
    type Output = ();

    fn describe(&self) -> String {
        format!("hidden: {}", self.descriptor.description)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<()>> {
        Ok(match candidates(self.descriptor, session).await? {
            Some((_, matches)) if matches.iter().any(|e| e.visible) => {
                Check::Pending(Observation::Visible)
            }
            _ => Check::Met(()),
        })
    }
}

/// The element is visible, enabled and not covered
pub struct Actionable<'a> {
    pub descriptor: &'a ElementDescriptor,
}

#[async_trait]
impl Condition for Actionable<'_> {
    type Output = ElementHandle;

    fn describe(&self) -> String {
        format!("actionable: {}", self.descriptor.description)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<ElementHandle>> {
        let element = match lookup(self.descriptor, session).await? {
            Lookup::Found(element) => element,
            Lookup::Absent => return Ok(Check::Pending(Observation::Absent)),
        };
        Ok(if !element.visible {
            Check::Pending(Observation::Hidden)
        } else if !element.enabled {
            Check::Pending(Observation::Blocked("disabled".to_string()))
        } else if element.covered {
            Check::Pending(Observation::Blocked("covered by another element".to_string()))
        } else {
            Check::Met(element)
        })
    }
}

/// The element's normalized text contains `expected`
pub struct TextContains<'a> {
    pub descriptor: &'a ElementDescriptor,
    pub expected: &'a str,
}

#[async_trait]
impl Condition for TextContains<'_> {
    type Output = ElementHandle;

    fn describe(&self) -> String {
        format!("text {:?} in {}", self.expected, self.descriptor.description)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<ElementHandle>> {
        let element = match lookup(self.descriptor, session).await? {
            Lookup::Found(element) => element,
            Lookup::Absent => return Ok(Check::Pending(Observation::Absent)),
        };
        let text = normalize(&element.text);
        if text.contains(&normalize(self.expected)) {
            Ok(Check::Met(element))
        } else {
            Ok(Check::Pending(Observation::Text(text)))
        }
    }
}

/// Collapse whitespace runs and trim
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use test_case::test_case;

    use super::*;
    use crate::definition::Strategy;
    use crate::driver::scripted::{FakeElement, ScriptedApp, ScriptedFactory};
    use crate::driver::SessionFactory;

    const PAGE: &str = "http://app.test/";

    async fn session_on(elements: Vec<FakeElement>) -> Box<dyn BrowserSession> {
        let factory = ScriptedFactory::new(ScriptedApp::new().route(PAGE, elements));
        let mut session = factory.open().await.unwrap();
        session.goto(PAGE).await.unwrap();
        session
    }

    fn handle(id: &str, visible: bool) -> ElementHandle {
        ElementHandle {
            id: id.to_string(),
            tag_name: "button".to_string(),
            text: String::new(),
            value: None,
            visible,
            enabled: true,
            editable: false,
            covered: false,
        }
    }

    fn found_id(lookup: Lookup) -> Option<String> {
        match lookup {
            Lookup::Found(e) => Some(e.id),
            Lookup::Absent => None,
        }
    }

    #[test_case(&[true], None => Some("e0".to_string()); "single match")]
    #[test_case(&[false, true, false], None => Some("e1".to_string()); "one visible among hidden")]
    #[test_case(&[true, true], Some(1) => Some("e1".to_string()); "nth among visible")]
    #[test_case(&[false, false], Some(0) => Some("e0".to_string()); "nth among all when none visible")]
    #[test_case(&[true, false, true], Some(1) => Some("e2".to_string()); "nth counts visible only")]
    #[test_case(&[true, true], Some(5) => None; "nth beyond matches")]
    fn test_disambiguation(visibility: &[bool], nth: Option<usize>) -> Option<String> {
        let mut descriptor = ElementDescriptor::new("save button", Strategy::css("button"));
        descriptor.nth = nth;
        let matches = visibility
            .iter()
            .enumerate()
            .map(|(i, v)| handle(&format!("e{}", i), *v))
            .collect();
        found_id(disambiguate(&descriptor, matches).unwrap())
    }

    #[test]
    fn test_ambiguous_without_nth() {
        let descriptor = ElementDescriptor::new("save button", Strategy::css("button"));
        let err = disambiguate(&descriptor, vec![handle("a", true), handle("b", true)]).unwrap_err();
        assert_eq!(
            err,
            StepError::AmbiguousMatch {
                description: "save button".to_string(),
                count: 2
            }
        );
    }

    #[tokio::test]
    async fn test_first_fallback_wins_when_primary_empty() {
        let mut session = session_on(vec![
            FakeElement::input("email").selector("input[type=\"email\"]"),
            FakeElement::input("other").selector("input"),
        ])
        .await;

        let descriptor = ElementDescriptor::new("email field", Strategy::placeholder("seu@email.com"))
            .or(Strategy::css("input[type=\"email\"]"))
            .or(Strategy::css("input"));

        let found = lookup(&descriptor, session.as_mut()).await.unwrap();
        assert_eq!(found_id(found), Some("email".to_string()));
    }

    #[tokio::test]
    async fn test_primary_ambiguous_does_not_fall_through() {
        let mut session = session_on(vec![
            FakeElement::button("a", "Salvar"),
            FakeElement::button("b", "Salvar"),
            FakeElement::button("c", "Salvar").test_id("save"),
        ])
        .await;

        let descriptor = ElementDescriptor::new("save button", Strategy::text("Salvar"))
            .or(Strategy::TestId("save".to_string()));
        let err = lookup(&descriptor, session.as_mut()).await.unwrap_err();
        assert!(matches!(err, StepError::AmbiguousMatch { count: 3, .. }));
    }

    #[tokio::test]
    async fn test_scoped_lookup() {
        let mut session = session_on(vec![
            FakeElement::new("modal", "div").role("dialog"),
            FakeElement::button("modal-save", "Salvar").inside("modal"),
            FakeElement::button("page-save", "Salvar"),
        ])
        .await;

        let descriptor = ElementDescriptor::new("modal save", Strategy::text("Salvar")).within(
            ElementDescriptor::new("modal", Strategy::Role { role: "dialog".into(), name: None }),
        );
        let found = lookup(&descriptor, session.as_mut()).await.unwrap();
        assert_eq!(found_id(found), Some("modal-save".to_string()));
    }

    #[tokio::test]
    async fn test_absent_container_means_absent() {
        let mut session = session_on(vec![FakeElement::button("save", "Salvar")]).await;
        let descriptor = ElementDescriptor::new("modal save", Strategy::text("Salvar"))
            .within(ElementDescriptor::new("modal", Strategy::css(".modal")));
        assert_eq!(lookup(&descriptor, session.as_mut()).await.unwrap(), Lookup::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_times_out_with_not_found() {
        let mut session = session_on(vec![]).await;
        let descriptor = ElementDescriptor::new("ghost", Strategy::css("#ghost")).or(Strategy::text("Ghost"));
        let err = resolve(
            &descriptor,
            session.as_mut(),
            &WaitOptions::new(Duration::from_millis(300)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            StepError::NotFound {
                description: "ghost".to_string(),
                strategies: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_waits_for_late_element() {
        let late = FakeElement::new("late", "div").selector("#late");
        let mut session = session_on(vec![FakeElement::button("arm", "Arm").on_click(move |page| {
            let late = late.clone();
            page.after(3, move |page| page.insert(late.clone()));
        })])
        .await;
        let arm = session.query(&Strategy::text("Arm"), None).await.unwrap().remove(0);
        session.click(&arm).await.unwrap();

        let descriptor = ElementDescriptor::new("late", Strategy::css("#late"));
        let found = resolve(
            &descriptor,
            session.as_mut(),
            &WaitOptions::new(Duration::from_secs(2)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(found.id, "late");
    }

    #[tokio::test]
    async fn test_hidden_condition_ignores_ambiguity() {
        let mut session = session_on(vec![
            FakeElement::new("t1", "div").text("Carregando").hidden(),
            FakeElement::new("t2", "div").text("Carregando").hidden(),
        ])
        .await;
        let descriptor = ElementDescriptor::new("spinner", Strategy::text("Carregando"));
        let check = Hidden { descriptor: &descriptor }.check(session.as_mut()).await.unwrap();
        assert!(matches!(check, Check::Met(())));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Bem-vindo,\n   Dr.  Silva "), "Bem-vindo, Dr. Silva");
    }
}
