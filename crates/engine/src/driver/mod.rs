//! Browser automation seam
//!
//! The engine never talks to a browser directly. It consumes observable state
//! (element snapshots, current URL, screenshots) and emits actions through
//! [`BrowserSession`]. Sessions are created by a [`SessionFactory`] and owned
//! through a [`SessionHandle`].

pub mod chromium;
pub mod scripted;

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::definition::Strategy;
use crate::error::{DriverError, DriverResult};

/// Snapshot of a live element at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier, stable for the element's lifetime
    pub id: String,
    pub tag_name: String,
    /// Normalized visible text
    #[serde(default)]
    pub text: String,
    /// Current input value, for form controls
    #[serde(default)]
    pub value: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    /// Accepts text input
    pub editable: bool,
    /// Another element sits on top of its center point
    #[serde(default)]
    pub covered: bool,
}

/// One browser context/page
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> DriverResult<()>;

    /// Document finished loading
    async fn is_ready(&mut self) -> DriverResult<bool>;

    /// All matches of one strategy in document order, optionally inside `scope`
    async fn query(
        &mut self,
        strategy: &Strategy,
        scope: Option<&ElementHandle>,
    ) -> DriverResult<Vec<ElementHandle>>;

    /// Fresh snapshot of a previously returned element; `None` once detached
    async fn refresh(&mut self, element: &ElementHandle) -> DriverResult<Option<ElementHandle>>;

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()>;

    /// Replace the element's value
    async fn fill(&mut self, element: &ElementHandle, value: &str) -> DriverResult<()>;

    async fn current_url(&mut self) -> DriverResult<String>;

    /// PNG bytes of the current viewport, or the whole page
    async fn screenshot(&mut self, full_page: bool) -> DriverResult<Vec<u8>>;

    /// Release the browser context
    async fn close(&mut self) -> DriverResult<()>;
}

/// Creates independent sessions
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>>;
}

/// Exclusive ownership of one session
///
/// `close` consumes the handle, so a handle is torn down at most once; the
/// orchestrator closes every handle it opens on every exit path.
pub struct SessionHandle {
    id: Uuid,
    inner: Box<dyn BrowserSession>,
    opened_at: Instant,
}

impl SessionHandle {
    pub async fn open(factory: &dyn SessionFactory) -> DriverResult<Self> {
        let id = Uuid::new_v4();
        debug!(session = %id, "Opening browser session");
        let inner = factory.open().await?;
        info!(session = %id, "Browser session ready");
        Ok(Self {
            id,
            inner,
            opened_at: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn driver(&mut self) -> &mut dyn BrowserSession {
        self.inner.as_mut()
    }

    /// Tear the session down; failures are logged and returned
    pub async fn close(mut self) -> DriverResult<()> {
        let lifetime = self.opened_at.elapsed();
        match self.inner.close().await {
            Ok(()) => {
                info!(session = %self.id, "Browser session closed after {} ms", lifetime.as_millis());
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, "Browser session teardown failed: {}", e);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// Messages CDP reports when the document under a running script goes away
const CONTEXT_LOST_MARKERS: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Cannot find default execution context",
];

/// Classify a failed script evaluation
pub(crate) fn script_failure(message: String) -> DriverError {
    if CONTEXT_LOST_MARKERS.iter().any(|m| message.contains(m)) {
        DriverError::ContextLost(message)
    } else {
        DriverError::Script(message)
    }
}

/// Wrap a driver library error
pub(crate) fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}
