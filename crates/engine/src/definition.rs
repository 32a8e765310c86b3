//! Declarative scenario definitions
//!
//! Scenarios are YAML documents describing a user journey:
//!
//! ```yaml
//! name: login-form
//! tags: [auth, smoke]
//! steps:
//!   - kind: navigate
//!     value: /#/login
//!   - kind: fill
//!     target:
//!       description: email field
//!       primary: { placeholder: "seu@email.com" }
//!       fallbacks:
//!         - { css: 'input[type="email"]' }
//!     value: ${DEMO_EMAIL}
//!   - kind: wait_for_url
//!     value: "**/dashboard"
//! ```
//!
//! Strings may reference environment variables as `${NAME}`. Interpolation runs
//! on the parsed document, so injected values never change its structure.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifacts::slug;
use crate::error::{ProbeError, ProbeResult};
use crate::wait::UrlPattern;

/// Step timeout used when neither the step nor the run configuration sets one
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 5_000;

/// One way of finding an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// CSS selector
    Css(String),
    /// Normalized text equals
    Text(String),
    /// Normalized text contains
    TextContains(String),
    /// ARIA role, optionally narrowed by accessible name
    Role {
        role: String,
        #[serde(default)]
        name: Option<String>,
    },
    /// aria-label or associated `<label>`
    Label(String),
    Placeholder(String),
    Title(String),
    /// `data-testid` attribute
    TestId(String),
    /// Arbitrary attribute equals
    Attribute { name: String, value: String },
}

impl Strategy {
    pub fn css(selector: impl Into<String>) -> Self {
        Strategy::Css(selector.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Strategy::Text(text.into())
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Strategy::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Strategy::Placeholder(text.into())
    }

    pub fn label(text: impl Into<String>) -> Self {
        Strategy::Label(text.into())
    }

    fn strings_mut(&mut self) -> Vec<&mut String> {
        match self {
            Strategy::Css(s)
            | Strategy::Text(s)
            | Strategy::TextContains(s)
            | Strategy::Label(s)
            | Strategy::Placeholder(s)
            | Strategy::Title(s)
            | Strategy::TestId(s) => vec![s],
            Strategy::Role { role, name } => {
                let mut v = vec![role];
                if let Some(n) = name {
                    v.push(n);
                }
                v
            }
            Strategy::Attribute { name, value } => vec![name, value],
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            Strategy::Css(s)
            | Strategy::Text(s)
            | Strategy::TextContains(s)
            | Strategy::Label(s)
            | Strategy::Placeholder(s)
            | Strategy::Title(s)
            | Strategy::TestId(s) => s.trim().is_empty(),
            Strategy::Role { role, .. } => role.trim().is_empty(),
            Strategy::Attribute { name, .. } => name.trim().is_empty(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Css(s) => write!(f, "css={}", s),
            Strategy::Text(s) => write!(f, "text={:?}", s),
            Strategy::TextContains(s) => write!(f, "text~={:?}", s),
            Strategy::Role { role, name: Some(n) } => write!(f, "role={}[name={:?}]", role, n),
            Strategy::Role { role, name: None } => write!(f, "role={}", role),
            Strategy::Label(s) => write!(f, "label={:?}", s),
            Strategy::Placeholder(s) => write!(f, "placeholder={:?}", s),
            Strategy::Title(s) => write!(f, "title={:?}", s),
            Strategy::TestId(s) => write!(f, "test-id={}", s),
            Strategy::Attribute { name, value } => write!(f, "[{}={:?}]", name, value),
        }
    }
}

/// A named reference to a UI element
///
/// `primary` is mandatory, so a descriptor always carries at least one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    /// Human-readable name used in failure messages
    pub description: String,

    pub primary: Strategy,

    /// Tried in order when `primary` matches nothing
    #[serde(default)]
    pub fallbacks: Vec<Strategy>,

    /// Container the element must live in; resolved first and must be unique
    #[serde(default)]
    pub within: Option<Box<ElementDescriptor>>,

    /// Explicit document-order pick when several elements remain after visibility narrowing
    #[serde(default)]
    pub nth: Option<usize>,
}

impl ElementDescriptor {
    pub fn new(description: impl Into<String>, primary: Strategy) -> Self {
        Self {
            description: description.into(),
            primary,
            fallbacks: Vec::new(),
            within: None,
            nth: None,
        }
    }

    pub fn or(mut self, fallback: Strategy) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    pub fn within(mut self, container: ElementDescriptor) -> Self {
        self.within = Some(Box::new(container));
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    /// Primary first, then fallbacks in order
    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }

    pub fn strategy_count(&self) -> usize {
        1 + self.fallbacks.len()
    }

    fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("element descriptor has an empty description".to_string());
        }
        if let Some(blank) = self.strategies().find(|s| s.is_blank()) {
            return Err(format!("'{}' has a blank strategy ({})", self.description, blank));
        }
        if let Some(container) = &self.within {
            container.validate()?;
        }
        Ok(())
    }

    fn interpolate(&mut self, env: &dyn Fn(&str) -> Option<String>) -> ProbeResult<()> {
        self.description = interpolate(&self.description, env)?;
        for strategy in std::iter::once(&mut self.primary).chain(self.fallbacks.iter_mut()) {
            for s in strategy.strings_mut() {
                *s = interpolate(s, env)?;
            }
        }
        if let Some(container) = self.within.as_mut() {
            container.interpolate(env)?;
        }
        Ok(())
    }
}

/// What a step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Navigate,
    Fill,
    Click,
    WaitForVisible,
    WaitForHidden,
    WaitForUrl,
    AssertText,
    Screenshot,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Navigate => "navigate",
            StepKind::Fill => "fill",
            StepKind::Click => "click",
            StepKind::WaitForVisible => "wait_for_visible",
            StepKind::WaitForHidden => "wait_for_hidden",
            StepKind::WaitForUrl => "wait_for_url",
            StepKind::AssertText => "assert_text",
            StepKind::Screenshot => "screenshot",
        }
    }

    pub fn requires_target(&self) -> bool {
        !matches!(self, StepKind::Navigate | StepKind::Screenshot)
    }

    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            StepKind::Navigate | StepKind::Fill | StepKind::WaitForUrl | StepKind::AssertText
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ElementDescriptor>,

    /// URL for navigate, text for fill, pattern for wait_for_url, expected text for assert_text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Screenshot steps only
    #[serde(default)]
    pub full_page: bool,
}

impl Step {
    fn new(kind: StepKind, target: Option<ElementDescriptor>, value: Option<String>) -> Self {
        Self {
            kind,
            target,
            value,
            timeout_ms: None,
            full_page: false,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(StepKind::Navigate, None, Some(url.into()))
    }

    pub fn fill(target: ElementDescriptor, value: impl Into<String>) -> Self {
        Self::new(StepKind::Fill, Some(target), Some(value.into()))
    }

    pub fn click(target: ElementDescriptor) -> Self {
        Self::new(StepKind::Click, Some(target), None)
    }

    pub fn wait_for_visible(target: ElementDescriptor) -> Self {
        Self::new(StepKind::WaitForVisible, Some(target), None)
    }

    pub fn wait_for_hidden(target: ElementDescriptor) -> Self {
        Self::new(StepKind::WaitForHidden, Some(target), None)
    }

    pub fn wait_for_url(pattern: impl Into<String>) -> Self {
        Self::new(StepKind::WaitForUrl, None, Some(pattern.into()))
    }

    pub fn assert_text(target: ElementDescriptor, expected: impl Into<String>) -> Self {
        Self::new(StepKind::AssertText, Some(target), Some(expected.into()))
    }

    pub fn screenshot() -> Self {
        Self::new(StepKind::Screenshot, None, None)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn full_page(mut self) -> Self {
        self.full_page = true;
        self
    }

    /// Per-step override, else the run default
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }

    pub fn target_description(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.description.as_str())
    }

    /// Short label for logs, e.g. `click(submit button)`
    pub fn label(&self) -> String {
        match (&self.target, &self.value) {
            (Some(t), _) => format!("{}({})", self.kind, t.description),
            (None, Some(v)) => format!("{}({})", self.kind, v),
            (None, None) => self.kind.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kind.requires_target() && self.target.is_none() {
            return Err(format!("{} requires a target", self.kind));
        }
        if self.kind.requires_value() {
            match self.value.as_deref() {
                None => return Err(format!("{} requires a value", self.kind)),
                Some(v) if v.trim().is_empty() && self.kind != StepKind::Fill => {
                    return Err(format!("{} requires a non-empty value", self.kind));
                }
                _ => {}
            }
        }
        if self.kind == StepKind::WaitForUrl {
            if let Some(pattern) = &self.value {
                UrlPattern::parse(pattern).map_err(|e| format!("bad url pattern: {}", e))?;
            }
        }
        if let Some(target) = &self.target {
            target.validate()?;
        }
        Ok(())
    }

    fn interpolate(&mut self, env: &dyn Fn(&str) -> Option<String>) -> ProbeResult<()> {
        if let Some(v) = self.value.as_mut() {
            *v = interpolate(v, env)?;
        }
        if let Some(t) = self.target.as_mut() {
            t.interpolate(env)?;
        }
        Ok(())
    }
}

/// What the runner does after a failed step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Record the failure, skip dependent steps, keep going
    ContinueAndRecord,
}

/// An ordered user journey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering runs
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub on_failure: FailurePolicy,

    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            on_failure: FailurePolicy::Abort,
            steps,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn validate(&self) -> ProbeResult<()> {
        let invalid = |reason: String| ProbeError::InvalidScenario {
            scenario: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("scenario name is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("scenario has no steps".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate()
                .map_err(|reason| invalid(format!("step {}: {}", index, reason)))?;
        }
        Ok(())
    }

    /// Parse a scenario from YAML, interpolating `${VAR}` from the process environment
    pub fn from_yaml(yaml: &str) -> ProbeResult<Self> {
        Self::from_yaml_with_env(yaml, "<inline>", &|name| std::env::var(name).ok())
    }

    pub fn from_yaml_with_env(
        yaml: &str,
        source_name: &str,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> ProbeResult<Self> {
        let parse_error = |message: String| ProbeError::ScenarioParse {
            source_name: source_name.to_string(),
            message,
        };

        // Through serde_json so externally tagged strategies read as single-key maps.
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let document = serde_json::to_value(document).map_err(|e| parse_error(e.to_string()))?;
        let mut scenario: Scenario =
            serde_json::from_value(document).map_err(|e| parse_error(e.to_string()))?;

        scenario.name = interpolate(&scenario.name, env)?;
        for step in &mut scenario.steps {
            step.interpolate(env)?;
        }
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> ProbeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_with_env(&content, &path.display().to_string(), &|name| {
            std::env::var(name).ok()
        })
    }

    /// Load every scenario under the given files and directories
    ///
    /// Directories are searched recursively for `.yaml`/`.yml` files in sorted
    /// order. Names must be unique since they key the artifact layout.
    pub fn load_paths(paths: &[PathBuf]) -> ProbeResult<Vec<Self>> {
        let mut scenarios = Vec::new();

        for path in paths {
            if path.is_dir() {
                let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .map(|e| e.into_path())
                    .filter(|p| {
                        p.extension()
                            .map(|ext| ext == "yaml" || ext == "yml")
                            .unwrap_or(false)
                    })
                    .collect();
                files.sort();
                for file in files {
                    debug!("Loading scenario file {}", file.display());
                    scenarios.push(Self::from_file(&file)?);
                }
            } else {
                scenarios.push(Self::from_file(path)?);
            }
        }

        Self::ensure_distinct(&scenarios)?;
        Ok(scenarios)
    }

    /// Names must be unique, and so must their artifact directories
    pub fn ensure_distinct(scenarios: &[Self]) -> ProbeResult<()> {
        let mut names = HashSet::new();
        let mut dirs: HashMap<String, &str> = HashMap::new();
        for scenario in scenarios {
            if !names.insert(scenario.name.as_str()) {
                return Err(ProbeError::InvalidScenario {
                    scenario: scenario.name.clone(),
                    reason: "duplicate scenario name".to_string(),
                });
            }
            if let Some(other) = dirs.insert(slug(&scenario.name), scenario.name.as_str()) {
                return Err(ProbeError::InvalidScenario {
                    scenario: scenario.name.clone(),
                    reason: format!(
                        "artifact directory '{}' is already used by scenario '{}'",
                        slug(&scenario.name),
                        other
                    ),
                });
            }
        }
        Ok(())
    }

    /// Keep scenarios carrying `tag`
    pub fn filter_by_tag(scenarios: Vec<Self>, tag: &str) -> Vec<Self> {
        scenarios.into_iter().filter(|s| s.has_tag(tag)).collect()
    }
}

fn env_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"))
}

/// Replace `${NAME}` references using `env`
pub fn interpolate(input: &str, env: &dyn Fn(&str) -> Option<String>) -> ProbeResult<String> {
    let re = env_reference();
    if !re.is_match(input) {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("group 0 always present");
        let name = &caps[1];
        let value = env(name).ok_or_else(|| ProbeError::MissingEnv(name.to_string()))?;
        out.push_str(&input[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&input[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "DEMO_EMAIL" => Some("medico@clinica.com".to_string()),
            "DEMO_PASSWORD" => Some("123456".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_login_scenario() {
        let yaml = r#"
name: login-form
description: Log in through the form
tags: [auth, smoke]
steps:
  - kind: navigate
    value: /#/login
  - kind: fill
    target:
      description: email field
      primary: { placeholder: "seu@email.com" }
      fallbacks:
        - { css: 'input[type="email"]' }
    value: ${DEMO_EMAIL}
  - kind: fill
    target:
      description: password field
      primary: { css: 'input[type="password"]' }
    value: ${DEMO_PASSWORD}
  - kind: click
    target:
      description: submit button
      primary: { role: { role: button, name: Acessar Sistema } }
  - kind: wait_for_url
    value: "**/dashboard"
    timeout_ms: 10000
"#;
        let scenario = Scenario::from_yaml_with_env(yaml, "test", &env).unwrap();
        assert_eq!(scenario.name, "login-form");
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.on_failure, FailurePolicy::Abort);
        assert!(scenario.has_tag("smoke"));

        let email = &scenario.steps[1];
        assert_eq!(email.value.as_deref(), Some("medico@clinica.com"));
        let target = email.target.as_ref().unwrap();
        assert_eq!(target.primary, Strategy::placeholder("seu@email.com"));
        assert_eq!(target.fallbacks, vec![Strategy::css(r#"input[type="email"]"#)]);

        let submit = scenario.steps[3].target.as_ref().unwrap();
        assert_eq!(submit.primary, Strategy::role("button", "Acessar Sistema"));
        assert_eq!(scenario.steps[4].timeout_ms, Some(10000));
    }

    #[test]
    fn test_scoped_descriptor() {
        let yaml = r#"
name: close-dialog
on_failure: continue_and_record
steps:
  - kind: click
    target:
      description: dialog close button
      primary: { label: Fechar }
      within:
        description: dialog
        primary: { role: { role: dialog } }
  - kind: wait_for_hidden
    target:
      description: dialog
      primary: { role: { role: dialog } }
"#;
        let scenario = Scenario::from_yaml_with_env(yaml, "test", &env).unwrap();
        assert_eq!(scenario.on_failure, FailurePolicy::ContinueAndRecord);
        let target = scenario.steps[0].target.as_ref().unwrap();
        let container = target.within.as_ref().unwrap();
        assert_eq!(
            container.primary,
            Strategy::Role {
                role: "dialog".to_string(),
                name: None
            }
        );
    }

    #[test]
    fn test_missing_env_is_reported() {
        let yaml = r#"
name: needs-secret
steps:
  - kind: navigate
    value: ${BASE_PATH}/login
"#;
        let err = Scenario::from_yaml_with_env(yaml, "test", &env).unwrap_err();
        assert!(matches!(err, ProbeError::MissingEnv(ref v) if v == "BASE_PATH"));
    }

    #[test]
    fn test_interpolated_value_cannot_change_structure() {
        let tricky = |name: &str| (name == "X").then(|| "a: b\n- c".to_string());
        let out = interpolate("prefix ${X} suffix", &tricky).unwrap();
        assert_eq!(out, "prefix a: b\n- c suffix");
    }

    #[test]
    fn test_target_required() {
        let yaml = r#"
name: broken
steps:
  - kind: click
"#;
        let err = Scenario::from_yaml_with_env(yaml, "test", &env).unwrap_err();
        match err {
            ProbeError::InvalidScenario { scenario, reason } => {
                assert_eq!(scenario, "broken");
                assert!(reason.contains("step 0"));
                assert!(reason.contains("requires a target"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let err = Scenario::new("empty", vec![]).validate().unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }

    #[test]
    fn test_assert_text_requires_expected_text() {
        let step = Step::assert_text(ElementDescriptor::new("heading", Strategy::css("h1")), "  ");
        assert!(step.validate().is_err());
    }

    #[test]
    fn test_fill_allows_empty_value() {
        let step = Step::fill(ElementDescriptor::new("search", Strategy::css("input")), "");
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_bad_url_pattern_rejected() {
        let step = Step::wait_for_url("re:(unclosed");
        assert!(step.validate().unwrap_err().contains("bad url pattern"));
    }

    #[test]
    fn test_step_label_and_timeout() {
        let step = Step::click(ElementDescriptor::new("submit button", Strategy::css("button")))
            .with_timeout_ms(250);
        assert_eq!(step.label(), "click(submit button)");
        assert_eq!(step.timeout(Duration::from_secs(5)), Duration::from_millis(250));
        assert_eq!(Step::screenshot().timeout(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_load_paths_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let body = "name: same\nsteps:\n  - kind: screenshot\n";
        std::fs::write(dir.path().join("a.yaml"), body).unwrap();
        std::fs::write(dir.path().join("b.yml"), body).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let err = Scenario::load_paths(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(err.to_string().contains("duplicate scenario name"));
    }

    #[test]
    fn test_load_paths_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: second\nsteps:\n  - kind: screenshot\n").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "name: first\nsteps:\n  - kind: screenshot\n").unwrap();

        let scenarios = Scenario::load_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_tag_filter() {
        let scenarios = vec![
            Scenario::from_yaml("name: login\nsteps:\n  - kind: screenshot\n").unwrap().with_tags(["smoke", "auth"]),
            Scenario::new("agenda", vec![Step::screenshot()]).with_tags(["modal"]),
        ];
        let smoke = Scenario::filter_by_tag(scenarios, "smoke");
        assert_eq!(smoke.len(), 1);
        assert!(smoke[0].has_tag("auth"));
    }

    #[test]
    fn test_colliding_artifact_directories_rejected() {
        let scenarios = vec![
            Scenario::new("Login / demo", vec![Step::screenshot()]),
            Scenario::new("Login - demo", vec![Step::screenshot()]),
        ];
        let err = Scenario::ensure_distinct(&scenarios).unwrap_err();
        assert!(err.to_string().contains("Login / demo"));

        let distinct = vec![
            Scenario::new("Login demo", vec![Step::screenshot()]),
            Scenario::new("Login form", vec![Step::screenshot()]),
        ];
        assert!(Scenario::ensure_distinct(&distinct).is_ok());
    }
}
