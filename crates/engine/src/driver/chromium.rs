//! Chromium driver over the DevTools protocol
//!
//! Each session launches its own browser process, so sessions share no
//! cookies, storage or cache. Element lookups run an injected script that
//! tags matches with a `data-uiprobe-id` attribute and returns snapshots as
//! JSON; later actions address elements through that attribute.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{protocol, script_failure, BrowserSession, ElementHandle, SessionFactory};
use crate::config::{RunConfig, Viewport};
use crate::definition::Strategy;
use crate::error::{DriverError, DriverResult};

const ID_ATTRIBUTE: &str = "data-uiprobe-id";

/// Collects matches of one strategy. Called with `(strategy, scopeId)`.
const QUERY_JS: &str = r#"
(function (strategy, scopeId) {
  const ATTR = 'data-uiprobe-id';
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const root = scopeId ? document.querySelector('[' + ATTR + '="' + scopeId + '"]') : document;
  if (!root) return JSON.stringify([]);

  const labelOf = (el) => {
    const aria = el.getAttribute('aria-label');
    if (aria) return norm(aria);
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      const ref = document.getElementById(by);
      if (ref) return norm(ref.innerText);
    }
    if (el.labels && el.labels.length) return norm(el.labels[0].innerText);
    return null;
  };
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'select') return 'combobox';
    if (tag === 'dialog') return 'dialog';
    if (tag === 'input') {
      if (['button', 'submit', 'reset'].includes(type)) return 'button';
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      return 'textbox';
    }
    return null;
  };
  const roleOf = (el) => el.getAttribute('role') || implicitRole(el);
  const nameOf = (el) => labelOf(el) || norm(el.innerText || el.value || el.getAttribute('title'));
  const textOf = (el) => norm(el.innerText || el.textContent);
  const innermost = (els) => els.filter((el) => !els.some((o) => o !== el && el.contains(o)));

  const all = Array.from(root.querySelectorAll('*'));
  const kind = Object.keys(strategy)[0];
  const arg = strategy[kind];
  let found;
  switch (kind) {
    case 'css': found = Array.from(root.querySelectorAll(arg)); break;
    case 'text': found = innermost(all.filter((el) => textOf(el) === norm(arg))); break;
    case 'text_contains': found = innermost(all.filter((el) => textOf(el).includes(norm(arg)))); break;
    case 'role': found = all.filter((el) => roleOf(el) === arg.role && (arg.name == null || nameOf(el) === norm(arg.name))); break;
    case 'label': found = all.filter((el) => labelOf(el) === norm(arg)); break;
    case 'placeholder': found = all.filter((el) => el.getAttribute('placeholder') === arg); break;
    case 'title': found = all.filter((el) => el.getAttribute('title') === arg); break;
    case 'test_id': found = all.filter((el) => el.getAttribute('data-testid') === arg); break;
    case 'attribute': found = all.filter((el) => el.getAttribute(arg.name) === arg.value); break;
    default: throw new Error('unknown strategy ' + kind);
  }

  window.__uiprobeSeq = window.__uiprobeSeq || 0;
  return JSON.stringify(found.map((el) => {
    if (!el.hasAttribute(ATTR)) el.setAttribute(ATTR, 'e' + (++window.__uiprobeSeq));
    return window.__uiprobeSnapshot(el);
  }));
})
"#;

/// Installs `window.__uiprobeSnapshot` once per document
const SNAPSHOT_JS: &str = r#"
if (!window.__uiprobeSnapshot) {
  window.__uiprobeSnapshot = function (el) {
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const visible = rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden'
      && style.display !== 'none' && style.opacity !== '0';
    let covered = false;
    if (visible) {
      const top = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
      covered = !!top && top !== el && !el.contains(top);
    }
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    const textual = tag === 'textarea'
      || (tag === 'input' && !['button', 'submit', 'reset', 'checkbox', 'radio', 'file', 'hidden'].includes(type));
    return {
      id: el.getAttribute('data-uiprobe-id'),
      tag_name: tag,
      text: (el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim(),
      value: 'value' in el && typeof el.value === 'string' ? el.value : null,
      visible: visible,
      enabled: !el.disabled,
      editable: (textual && !el.readOnly) || el.isContentEditable,
      covered: covered,
    };
  };
}
"#;

/// Launch options for Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub viewport: Viewport,
}

impl ChromiumOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_executable: config.chrome_executable.clone(),
            viewport: config.viewport,
        }
    }
}

/// Opens one Chromium process per session
#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    options: ChromiumOptions,
}

impl ChromiumFactory {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn open(&self) -> DriverResult<Box<dyn BrowserSession>> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.options.viewport.width, self.options.viewport.height);

        if self.options.headless {
            debug!("Launching Chromium headless");
        } else {
            info!("Launching Chromium with a visible window");
            builder = builder.with_head();
        }

        let executable = self
            .options
            .chrome_executable
            .clone()
            .or_else(|| std::env::var_os("CHROME_BIN").map(PathBuf::from));
        if let Some(path) = executable {
            debug!("Using Chrome binary {}", path.display());
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(DriverError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("Browser handler error: {}", e);
                }
            }
            debug!("Browser handler task ended");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            handler_task: Some(handler_task),
            page,
            closed: false,
        }))
    }
}

/// A Chromium process with a single page
pub struct ChromiumSession {
    browser: Browser,
    handler_task: Option<JoinHandle<()>>,
    page: Page,
    closed: bool,
}

impl ChromiumSession {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, expression: String) -> DriverResult<T> {
        self.page
            .evaluate(expression)
            .await
            .map_err(|e| script_failure(e.to_string()))?
            .into_value::<T>()
            .map_err(protocol)
    }

    async fn snapshots(&self, expression: String) -> DriverResult<Vec<ElementHandle>> {
        self.eval::<bool>(format!("{}; true", SNAPSHOT_JS)).await?;
        let json: String = self.eval(expression).await?;
        serde_json::from_str(&json).map_err(protocol)
    }

    fn selector(element: &ElementHandle) -> String {
        format!("[{}=\"{}\"]", ID_ATTRIBUTE, element.id)
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.ensure_open()?;
        debug!("Navigating to {}", url);
        self.page.goto(url).await.map_err(protocol)?;
        Ok(())
    }

    async fn is_ready(&mut self) -> DriverResult<bool> {
        self.ensure_open()?;
        self.eval("document.readyState === 'complete'".to_string()).await
    }

    async fn query(
        &mut self,
        strategy: &Strategy,
        scope: Option<&ElementHandle>,
    ) -> DriverResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        let strategy = serde_json::to_string(strategy).map_err(protocol)?;
        let scope = serde_json::to_string(&scope.map(|s| s.id.as_str())).map_err(protocol)?;
        self.snapshots(format!("({})({}, {})", QUERY_JS, strategy, scope)).await
    }

    async fn refresh(&mut self, element: &ElementHandle) -> DriverResult<Option<ElementHandle>> {
        self.ensure_open()?;
        let selector = serde_json::to_string(&Self::selector(element)).map_err(protocol)?;
        let found = self
            .snapshots(format!(
                "(function () {{ const el = document.querySelector({}); \
                 return JSON.stringify(el ? [window.__uiprobeSnapshot(el)] : []); }})()",
                selector
            ))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn click(&mut self, element: &ElementHandle) -> DriverResult<()> {
        self.ensure_open()?;
        let target = self
            .page
            .find_element(Self::selector(element))
            .await
            .map_err(|_| DriverError::Detached(element.id.clone()))?;
        target
            .click()
            .await
            .map_err(|e| DriverError::Intercepted(format!("{}: {}", element.id, e)))?;
        Ok(())
    }

    async fn fill(&mut self, element: &ElementHandle, value: &str) -> DriverResult<()> {
        self.ensure_open()?;
        let selector = serde_json::to_string(&Self::selector(element)).map_err(protocol)?;
        let value = serde_json::to_string(value).map_err(protocol)?;
        let script = format!(
            r#"(function (sel, value) {{
  const el = document.querySelector(sel);
  if (!el) return false;
  el.focus();
  if (el.isContentEditable) {{
    el.innerText = value;
  }} else {{
    const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
  }}
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})({}, {})"#,
            selector, value
        );

        if self.eval::<bool>(script).await? {
            Ok(())
        } else {
            Err(DriverError::Detached(element.id.clone()))
        }
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        self.ensure_open()?;
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn screenshot(&mut self, full_page: bool) -> DriverResult<Vec<u8>> {
        self.ensure_open()?;
        self.page
            .screenshot(ScreenshotParams::builder().full_page(full_page).build())
            .await
            .map_err(protocol)
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.browser.close().await.map(|_| ()).map_err(protocol);
        if let Some(task) = self.handler_task.take() {
            if let Err(e) = task.await {
                debug!("Browser handler join failed: {}", e);
            }
        }
        result
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
