//! In-memory scripted browser
//!
//! A tiny page model: routes map a URL to a list of elements in document
//! order, and click hooks mutate the page (navigate, show/hide elements,
//! check form values). Every driver call, session open and teardown is
//! recorded so scenario behaviour can be asserted without a real browser.
//!
//! Each opened session starts from a fresh copy of the app, which makes the
//! app behave like a freshly reset system under test.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BrowserSession, ElementHandle, SessionFactory};
use crate::definition::Strategy;
use crate::error::{DriverError, DriverResult};

/// Page mutation run on click or after a delay
pub type Hook = Arc<dyn Fn(&mut PageState) + Send + Sync>;

/// PNG signature followed by an empty IHDR-less body; enough for artifact tests
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// An element of the scripted page
#[derive(Clone)]
pub struct FakeElement {
    pub id: String,
    pub tag: String,
    pub text: String,
    pub role: Option<String>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub title: Option<String>,
    pub test_id: Option<String>,
    /// CSS selectors this element answers to (exact string match)
    pub selectors: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// Id of the containing element
    pub parent: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub editable: bool,
    pub covered: bool,
    /// Swallows typed input (a controlled input that resets itself)
    pub rejects_input: bool,
    pub value: Option<String>,
    on_click: Option<Hook>,
}

impl FakeElement {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            text: String::new(),
            role: None,
            label: None,
            placeholder: None,
            title: None,
            test_id: None,
            selectors: Vec::new(),
            attributes: BTreeMap::new(),
            parent: None,
            visible: true,
            enabled: true,
            editable: false,
            covered: false,
            rejects_input: false,
            value: None,
            on_click: None,
        }
    }

    pub fn button(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, "button").text(text).role("button")
    }

    pub fn heading(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, "h1").text(text).role("heading")
    }

    pub fn input(id: impl Into<String>) -> Self {
        let mut el = Self::new(id, "input").role("textbox");
        el.editable = true;
        el.value = Some(String::new());
        el
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn test_id(mut self, test_id: impl Into<String>) -> Self {
        self.test_id = Some(test_id.into());
        self
    }

    pub fn selector(mut self, css: impl Into<String>) -> Self {
        self.selectors.push(css.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn inside(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn covered(mut self) -> Self {
        self.covered = true;
        self
    }

    pub fn rejecting_input(mut self) -> Self {
        self.rejects_input = true;
        self
    }

    pub fn on_click(mut self, hook: impl Fn(&mut PageState) + Send + Sync + 'static) -> Self {
        self.on_click = Some(Arc::new(hook));
        self
    }

    fn accessible_name(&self) -> String {
        self.label
            .as_deref()
            .map(normalize)
            .unwrap_or_else(|| normalize(&self.text))
    }

    fn matches(&self, strategy: &Strategy) -> bool {
        let text = normalize(&self.text);
        match strategy {
            Strategy::Css(sel) => self.selectors.iter().any(|s| s == sel),
            Strategy::Text(t) => text == normalize(t),
            Strategy::TextContains(t) => !t.is_empty() && text.contains(&normalize(t)),
            Strategy::Role { role, name } => {
                self.role.as_deref() == Some(role.as_str())
                    && name
                        .as_deref()
                        .map_or(true, |n| self.accessible_name() == normalize(n))
            }
            Strategy::Label(l) => self.label.as_deref() == Some(l.as_str()),
            Strategy::Placeholder(p) => self.placeholder.as_deref() == Some(p.as_str()),
            Strategy::Title(t) => self.title.as_deref() == Some(t.as_str()),
            Strategy::TestId(t) => self.test_id.as_deref() == Some(t.as_str()),
            Strategy::Attribute { name, value } => {
                self.attributes.get(name).map(String::as_str) == Some(value.as_str())
            }
        }
    }
}

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeElement")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("text", &self.text)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

/// Brackets, parentheses and quotes must balance, as in `querySelectorAll`
fn is_valid_selector(selector: &str) -> bool {
    let mut open = Vec::new();
    let mut quote: Option<char> = None;
    for c in selector.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => open.push(c),
            (None, ']') if open.pop() != Some('[') => return false,
            (None, ')') if open.pop() != Some('(') => return false,
            _ => {}
        }
    }
    !selector.trim().is_empty() && open.is_empty() && quote.is_none()
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Mutable state of one scripted page
pub struct PageState {
    url: String,
    elements: Vec<FakeElement>,
    routes: Arc<BTreeMap<String, Vec<FakeElement>>>,
    settle_polls: u32,
    loading_polls: u32,
    lose_context: bool,
    context_lost: bool,
    clock: u64,
    scheduled: Vec<(u64, Hook)>,
}

impl PageState {
    fn new(app: &ScriptedApp) -> Self {
        Self {
            url: "about:blank".to_string(),
            elements: Vec::new(),
            routes: Arc::new(app.routes.clone()),
            settle_polls: app.settle_polls,
            loading_polls: 0,
            lose_context: app.lose_context,
            context_lost: false,
            clock: 0,
            scheduled: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Load a route; unknown URLs render an empty page
    pub fn navigate(&mut self, url: impl Into<String>) {
        self.url = url.into();
        self.elements = self.routes.get(&self.url).cloned().unwrap_or_default();
        self.loading_polls = self.settle_polls;
        self.context_lost = self.lose_context;
        self.scheduled.clear();
    }

    pub fn value_of(&self, id: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.value.as_deref())
    }

    pub fn element(&self, id: &str) -> Option<&FakeElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut FakeElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn show(&mut self, id: &str) {
        if let Some(e) = self.element_mut(id) {
            e.visible = true;
        }
    }

    pub fn hide(&mut self, id: &str) {
        if let Some(e) = self.element_mut(id) {
            e.visible = false;
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.elements.retain(|e| e.id != id && e.parent.as_deref() != Some(id));
    }

    pub fn insert(&mut self, element: FakeElement) {
        self.elements.push(element);
    }

    /// Run `hook` once `polls` more observations have been made
    pub fn after(&mut self, polls: u64, hook: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.scheduled.push((self.clock + polls, Arc::new(hook)));
    }

    fn tick(&mut self) {
        self.clock += 1;
        let now = self.clock;
        let (due, pending): (Vec<_>, Vec<_>) =
            self.scheduled.drain(..).partition(|(at, _)| *at <= now);
        self.scheduled = pending;
        for (_, hook) in due {
            hook(self);
        }
    }

    /// An element is only visible when all of its ancestors are
    fn is_rendered(&self, element: &FakeElement) -> bool {
        let mut current = Some(element);
        while let Some(el) = current {
            if !el.visible {
                return false;
            }
            current = el.parent.as_deref().and_then(|id| self.element(id));
        }
        true
    }

    fn snapshot(&self, element: &FakeElement) -> ElementHandle {
        ElementHandle {
            id: element.id.clone(),
            tag_name: element.tag.clone(),
            text: normalize(&element.text),
            value: element.value.clone(),
            visible: self.is_rendered(element),
            enabled: element.enabled,
            editable: element.editable,
            covered: element.covered,
        }
    }

    fn is_inside(&self, element: &FakeElement, scope_id: &str) -> bool {
        let mut parent = element.parent.as_deref();
        while let Some(id) = parent {
            if id == scope_id {
                return true;
            }
            parent = self.element(id).and_then(|p| p.parent.as_deref());
        }
        false
    }
}

/// Description of the scripted application
#[derive(Clone, Default)]
pub struct ScriptedApp {
    routes: BTreeMap<String, Vec<FakeElement>>,
    settle_polls: u32,
    lose_context: bool,
}

impl ScriptedApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: impl Into<String>, elements: Vec<FakeElement>) -> Self {
        self.routes.insert(url.into(), elements);
        self
    }

    /// Number of readiness polls that report "loading" after each navigation
    pub fn settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// The first readiness poll after each navigation fails as if the old
    /// document's execution context had been destroyed
    pub fn losing_context_on_navigation(mut self) -> Self {
        self.lose_context = true;
        self
    }
}

/// A recorded driver interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Goto(String),
    Query(String),
    Click(String),
    Fill(String, String),
    Screenshot,
    Close,
}

impl DriverCall {
    /// Calls that change page state or produce artifacts
    pub fn is_action(&self) -> bool {
        matches!(
            self,
            DriverCall::Goto(_) | DriverCall::Click(_) | DriverCall::Fill(..) | DriverCall::Screenshot
        )
    }
}

#[derive(Default)]
struct Ledger {
    calls: Vec<(usize, DriverCall)>,
    open_attempts: usize,
    teardowns: Vec<u32>,
}

/// Shared view of everything the scripted sessions did
#[derive(Clone, Default)]
pub struct Recorder {
    ledger: Arc<Mutex<Ledger>>,
}

impl Recorder {
    fn record(&self, session: usize, call: DriverCall) {
        self.ledger.lock().calls.push((session, call));
    }

    /// Calls of every session in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.ledger.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    /// Calls of one session, by open order
    pub fn session_calls(&self, session: usize) -> Vec<DriverCall> {
        self.ledger
            .lock()
            .calls
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn actions(&self) -> Vec<DriverCall> {
        self.calls().into_iter().filter(DriverCall::is_action).collect()
    }

    /// Sessions successfully opened
    pub fn sessions_opened(&self) -> usize {
        self.ledger.lock().teardowns.len()
    }

    pub fn open_attempts(&self) -> usize {
        self.ledger.lock().open_attempts
    }

    /// Teardown count per opened session
    pub fn teardowns(&self) -> Vec<u32> {
        self.ledger.lock().teardowns.clone()
    }
}

/// Factory for scripted sessions
#[derive(Clone)]
pub struct ScriptedFactory {
    app: Arc<ScriptedApp>,
    recorder: Recorder,
    failing_opens: usize,
    fail_screenshots: bool,
}

impl ScriptedFactory {
    pub fn new(app: ScriptedApp) -> Self {
        Self {
            app: Arc::new(app),
            recorder: Recorder::default(),
            failing_opens: 0,
            fail_screenshots: false,
        }
    }

    /// The first `n` open attempts fail
    pub fn fail_first_opens(mut self, n: usize) -> Self {
        self.failing_opens = n;
        self
    }

    pub fn fail_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>> {
        let index = {
            let mut ledger = self.recorder.ledger.lock();
            ledger.open_attempts += 1;
            if ledger.open_attempts <= self.failing_opens {
                return Err(DriverError::Launch("scripted launch failure".to_string()));
            }
            ledger.teardowns.push(0);
            ledger.teardowns.len() - 1
        };

        Ok(Box::new(ScriptedSession {
            index,
            state: PageState::new(&self.app),
            recorder: self.recorder.clone(),
            closed: false,
            fail_screenshots: self.fail_screenshots,
        }))
    }
}

/// One scripted page
pub struct ScriptedSession {
    index: usize,
    state: PageState,
    recorder: Recorder,
    closed: bool,
    fail_screenshots: bool,
}

impl ScriptedSession {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn find(&self, id: &str) -> DriverResult<&FakeElement> {
        self.state
            .element(id)
            .ok_or_else(|| DriverError::Detached(id.to_string()))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.recorder.record(self.index, DriverCall::Goto(url.to_string()));
        self.state.navigate(url);
        Ok(())
    }

    async fn is_ready(&mut self) -> DriverResult<bool> {
        self.ensure_open()?;
        self.state.tick();
        if self.state.context_lost {
            self.state.context_lost = false;
            return Err(DriverError::ContextLost(
                "Execution context was destroyed, most likely because of a navigation".to_string(),
            ));
        }
        if self.state.loading_polls > 0 {
            self.state.loading_polls -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn query(
        &mut self,
        strategy: &Strategy,
        scope: Option<&ElementHandle>,
    ) -> DriverResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        self.state.tick();
        self.recorder.record(self.index, DriverCall::Query(strategy.to_string()));
        if let Strategy::Css(selector) = strategy {
            if !is_valid_selector(selector) {
                return Err(DriverError::Script(format!(
                    "SyntaxError: '{}' is not a valid selector",
                    selector
                )));
            }
        }

        let state = &self.state;
        Ok(state
            .elements
            .iter()
            .filter(|e| e.matches(strategy))
            .filter(|e| scope.map_or(true, |s| state.is_inside(e, &s.id)))
            .map(|e| state.snapshot(e))
            .collect())
    }

    async fn refresh(&mut self, element: &ElementHandle) -> DriverResult<Option<ElementHandle>> {
        self.ensure_open()?;
        self.state.tick();
        let state = &self.state;
        Ok(state.element(&element.id).map(|e| state.snapshot(e)))
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.ensure_open()?;
        self.recorder.record(self.index, DriverCall::Click(element.id.clone()));

        let target = self.find(&element.id)?;
        if target.covered {
            return Err(DriverError::Intercepted(element.id.clone()));
        }
        if let Some(hook) = target.on_click.clone() {
            hook(&mut self.state);
        }
        Ok(())
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> DriverResult<()> {
        self.ensure_open()?;
        self.recorder.record(
            self.index,
            DriverCall::Fill(element.id.clone(), value.to_string()),
        );

        let target = self
            .state
            .element_mut(&element.id)
            .ok_or_else(|| DriverError::Detached(element.id.clone()))?;
        if !target.editable {
            return Err(DriverError::Script(format!(
                "<{}> does not accept input",
                target.tag
            )));
        }
        if !target.rejects_input {
            target.value = Some(value.to_string());
        }
        Ok(())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        self.ensure_open()?;
        self.state.tick();
        Ok(self.state.url.clone())
    }

    async fn screenshot(&mut self, _full_page: bool) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        self.recorder.record(self.index, DriverCall::Screenshot);
        if self.fail_screenshots {
            return Err(DriverError::Protocol("scripted screenshot failure".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.recorder.record(self.index, DriverCall::Close);
        if let Some(count) = self.recorder.ledger.lock().teardowns.get_mut(self.index) {
            *count += 1;
        }
        self.closed = true;
        Ok(())
    }
}
