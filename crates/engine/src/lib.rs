//! uiprobe engine
//!
//! Runs declarative UI scenarios against a browser:
//! - Resolves elements through ordered locator strategies with deterministic disambiguation
//! - Waits on observable state with bounded, cancellable polling
//! - Captures a screenshot and a structured report on every failure
//! - Orchestrates sessions so each one is torn down exactly once
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                │
//! │    ├── run_all(scenarios) -> Vec<RunResult>                 │
//! │    ├── SessionHandle::open / close   (one owner per session)│
//! │    └── ScenarioRunner::run(scenario, session)               │
//! │          ├── StepExecutor::execute(step)                    │
//! │          │     ├── locator::resolve(descriptor)             │
//! │          │     └── wait::wait_until(condition)              │
//! │          └── DiagnosticCapturer::capture_failure(...)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserSession (driver seam)                                │
//! │    ├── ChromiumFactory   (CDP via chromiumoxide)            │
//! │    └── ScriptedFactory   (in-memory page model for tests)   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod definition;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod executor;
pub mod locator;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod wait;

pub use config::{Isolation, RunConfig, Viewport};
pub use definition::{ElementDescriptor, FailurePolicy, Scenario, Step, StepKind, Strategy};
pub use driver::chromium::{ChromiumFactory, ChromiumOptions};
pub use driver::{BrowserSession, ElementHandle, SessionFactory, SessionHandle};
pub use error::{DriverError, ProbeError, ProbeResult, StepError, TimeoutReason};
pub use orchestrator::Orchestrator;
pub use report::{FailureReason, RunResult, RunStatus, StepStatus, SuiteSummary};
