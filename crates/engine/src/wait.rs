//! Wait engine: bounded, cancellable polling of observable UI state
//!
//! Every `wait_for_*` step and every implicit settle after an action goes
//! through [`wait_until`]. A poll evaluates a [`Condition`]; while it is not
//! met the last [`Observation`] is kept so an expired wait can say *why* it
//! expired (element absent vs present but hidden, wrong URL, ...).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::driver::BrowserSession;
use crate::error::{DriverError, StepError, StepResult, TimeoutReason};

/// Growth factor applied to the poll interval after every unmet poll
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Timing of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Ceiling for the backed-off interval
    pub max_poll_interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(100),
            max_poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration, max_poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_poll_interval = max_poll_interval.max(poll_interval);
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(BACKOFF_FACTOR).min(self.max_poll_interval)
    }
}

/// What a poll saw when its condition was not yet met
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// No element matched any strategy
    Absent,
    /// Element present, not visible
    Hidden,
    /// Element present and visible
    Visible,
    /// Element visible but not actionable (disabled, covered)
    Blocked(String),
    /// Current location
    Url(String),
    /// Element present with this (normalized) text
    Text(String),
    /// Document still loading
    NotReady,
}

impl Observation {
    pub fn timeout_reason(&self) -> TimeoutReason {
        match self {
            Observation::Absent => TimeoutReason::Absent,
            Observation::Hidden => TimeoutReason::HiddenTimeout,
            Observation::Visible => TimeoutReason::StillVisible,
            Observation::Blocked(_) => TimeoutReason::HiddenTimeout,
            Observation::Url(_) => TimeoutReason::UrlMismatch,
            Observation::Text(_) => TimeoutReason::HiddenTimeout,
            Observation::NotReady => TimeoutReason::NotSettled,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observation::Absent => f.write_str("element absent"),
            Observation::Hidden => f.write_str("element present but hidden"),
            Observation::Visible => f.write_str("element visible"),
            Observation::Blocked(why) => write!(f, "element {}", why),
            Observation::Url(url) => write!(f, "url {}", url),
            Observation::Text(text) => write!(f, "text {:?}", text),
            Observation::NotReady => f.write_str("document loading"),
        }
    }
}

/// Result of a single poll
#[derive(Debug)]
pub enum Check<T> {
    Met(T),
    Pending(Observation),
}

/// A predicate over observable session state
#[async_trait]
pub trait Condition: Send + Sync {
    type Output: Send;

    /// Used in timeout and cancellation messages
    fn describe(&self) -> String;

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<Self::Output>>;
}

/// Why a wait did not produce a value
#[derive(Debug)]
pub enum WaitFailure {
    /// The timeout elapsed; `last` is the final observation
    Expired { last: Observation, waited: Duration },
    /// A poll failed outright, or the run was cancelled
    Failed(StepError),
}

impl WaitFailure {
    /// Generic conversion for callers with no special timeout mapping
    pub fn into_step_error(self, waiting_for: &str, options: &WaitOptions) -> StepError {
        match self {
            WaitFailure::Expired { last, .. } => StepError::Timeout {
                waiting_for: waiting_for.to_string(),
                timeout_ms: options.timeout.as_millis() as u64,
                reason: last.timeout_reason(),
                last_observed: last.to_string(),
            },
            WaitFailure::Failed(e) => e,
        }
    }
}

impl From<StepError> for WaitFailure {
    fn from(e: StepError) -> Self {
        WaitFailure::Failed(e)
    }
}

/// Poll `condition` until met, expired, or cancelled
///
/// The condition is always checked at least once, even with a zero timeout.
/// Sleeps between polls grow by [`BACKOFF_FACTOR`] up to the configured
/// ceiling and never overshoot the deadline.
pub async fn wait_until<C: Condition + ?Sized>(
    condition: &C,
    session: &mut dyn BrowserSession,
    options: &WaitOptions,
    cancel: &CancellationToken,
) -> Result<C::Output, WaitFailure> {
    let start = Instant::now();
    let deadline = start + options.timeout;
    let mut interval = options.poll_interval;
    let mut polls = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(StepError::cancelled(condition.describe()).into());
        }

        polls += 1;
        let checked = tokio::select! {
            _ = cancel.cancelled() => return Err(StepError::cancelled(condition.describe()).into()),
            checked = condition.check(session) => checked?,
        };

        let last = match checked {
            Check::Met(value) => {
                trace!(polls, "condition met: {}", condition.describe());
                return Ok(value);
            }
            Check::Pending(observation) => observation,
        };

        let now = Instant::now();
        if now >= deadline {
            trace!(polls, "condition expired: {} ({})", condition.describe(), last);
            return Err(WaitFailure::Expired {
                last,
                waited: now - start,
            });
        }

        let nap = interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Err(StepError::cancelled(condition.describe()).into()),
            _ = tokio::time::sleep(nap) => {}
        }
        interval = options.next_interval(interval);
    }
}

/// URL matcher: a glob (`**/dashboard`) or, prefixed with `re:`, a regular expression
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Glob(glob::Pattern),
    Regex(Regex),
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        match pattern.strip_prefix("re:") {
            Some(re) => Regex::new(re).map(UrlPattern::Regex).map_err(|e| e.to_string()),
            None => glob::Pattern::new(pattern)
                .map(UrlPattern::Glob)
                .map_err(|e| e.to_string()),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Glob(p) => p.matches(url),
            UrlPattern::Regex(r) => r.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Glob(p) => write!(f, "{}", p.as_str()),
            UrlPattern::Regex(r) => write!(f, "re:{}", r.as_str()),
        }
    }
}

/// Current URL matches a pattern; yields the matching URL
#[derive(Debug)]
pub struct UrlMatches {
    pub pattern: UrlPattern,
}

#[async_trait]
impl Condition for UrlMatches {
    type Output = String;

    fn describe(&self) -> String {
        format!("url matching {}", self.pattern)
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<String>> {
        let url = session.current_url().await?;
        if self.pattern.matches(&url) {
            Ok(Check::Met(url))
        } else {
            Ok(Check::Pending(Observation::Url(url)))
        }
    }
}

/// Document finished loading
#[derive(Debug, Default)]
pub struct DocumentReady;

#[async_trait]
impl Condition for DocumentReady {
    type Output = ();

    fn describe(&self) -> String {
        "document ready".to_string()
    }

    async fn check(&self, session: &mut dyn BrowserSession) -> StepResult<Check<()>> {
        match session.is_ready().await {
            Ok(true) => Ok(Check::Met(())),
            Ok(false) => Ok(Check::Pending(Observation::NotReady)),
            // A navigation replaced the document mid-poll; the new one is still loading.
            Err(DriverError::ContextLost(_)) => Ok(Check::Pending(Observation::NotReady)),
            Err(e) => Err(e.into()),
        }
    }
}
