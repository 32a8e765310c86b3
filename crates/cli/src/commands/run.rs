//! `uiprobe run`

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uiprobe_engine::report::SuiteSummary;
use uiprobe_engine::{ChromiumFactory, ChromiumOptions, Orchestrator, RunConfig, Scenario, SessionFactory};

use crate::cli::RunArgs;
use crate::output::{print_error, print_failures, print_results, OutputFormat};

use super::load_scenarios;

/// Run the selected scenarios in Chromium; `Ok(false)` when any scenario failed
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    let config = args.resolve_config()?;
    let scenarios = load_scenarios(&args.select)?;

    let cancel = CancellationToken::new();
    let (signals, received) = mpsc::channel(2);
    let listener = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if signals.send(()).await.is_err() {
                break;
            }
        }
    });
    let watcher = tokio::spawn(watch_interrupts(received, cancel.clone()));
    let forced = tokio::spawn(async move {
        if let Ok(true) = watcher.await {
            print_error("Interrupted twice, exiting without cleanup");
            std::process::exit(2);
        }
    });

    let factory = Arc::new(ChromiumFactory::new(ChromiumOptions::from_config(&config)));
    let outcome = execute_with(config, &scenarios, factory, cancel, format).await;
    listener.abort();
    forced.abort();
    outcome
}

/// Cancel on the first interrupt; `true` once a second one arrives
pub(crate) async fn watch_interrupts(mut signals: mpsc::Receiver<()>, cancel: CancellationToken) -> bool {
    if signals.recv().await.is_none() {
        return false;
    }
    warn!("Interrupted, cancelling run (press Ctrl-C again to exit immediately)");
    cancel.cancel();
    signals.recv().await.is_some()
}

/// Run with any session factory
pub async fn execute_with(
    config: RunConfig,
    scenarios: &[Scenario],
    factory: Arc<dyn SessionFactory>,
    cancel: CancellationToken,
    format: OutputFormat,
) -> Result<bool> {
    info!(
        "Running {} scenario(s) against {} (artifacts in {})",
        scenarios.len(),
        config.base_url,
        config.artifact_dir.display()
    );

    let start = Instant::now();
    let orchestrator = Orchestrator::new(config, factory).with_cancellation(cancel);
    let results = orchestrator.run_all(scenarios).await?;
    let summary = SuiteSummary::from_results(&results, start.elapsed().as_millis() as u64);

    print_results(&results, &summary, format);
    print_failures(&results);
    Ok(summary.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_forces_exit() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(2);
        let watcher = tokio::spawn(watch_interrupts(rx, cancel.clone()));

        tx.send(()).await.unwrap();
        cancel.cancelled().await;
        assert!(!watcher.is_finished());

        tx.send(()).await.unwrap();
        assert!(watcher.await.unwrap());
    }

    #[tokio::test]
    async fn test_watcher_ends_quietly_without_interrupts() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<()>(2);
        drop(tx);

        assert!(!watch_interrupts(rx, cancel.clone()).await);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_then_run_end() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(2);
        tx.send(()).await.unwrap();
        drop(tx);

        assert!(!watch_interrupts(rx, cancel.clone()).await);
        assert!(cancel.is_cancelled());
    }
}
