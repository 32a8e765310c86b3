//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use uiprobe_engine::report::{RunResult, RunStatus, SuiteSummary};
use uiprobe_engine::Scenario;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Cannot serialize output: {}", e)),
    }
}

/// Print run results and the summary line
pub fn print_results(results: &[RunResult], summary: &SuiteSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(vec!["Scenario", "Status", "Attempts", "Failed step", "Duration"]);
            for result in results {
                table.add_row(vec![
                    result.scenario_name.clone(),
                    status_label(result.status),
                    result.attempts.to_string(),
                    failed_step(result),
                    format!("{} ms", result.duration_ms),
                ]);
            }
            println!("{table}");

            let line = format!(
                "{} passed, {} failed, {} retried ({} ms)",
                summary.passed, summary.failed, summary.retried, summary.duration_ms
            );
            if summary.success() {
                println!("{} {}", "✓".green(), line);
            } else {
                println!("{} {}", "✗".red(), line);
            }
        }
    }
}

fn status_label(status: RunStatus) -> String {
    match status {
        RunStatus::Passed => "✓ Passed".green().to_string(),
        RunStatus::Failed => "✗ Failed".red().to_string(),
    }
}

fn failed_step(result: &RunResult) -> String {
    match &result.failure_reason {
        None => "-".to_string(),
        Some(reason) => match (reason.step_index, reason.step_kind) {
            (Some(index), Some(kind)) => format!("{} ({})", index, kind),
            _ => reason.error.kind_name().to_string(),
        },
    }
}

/// One line per failing scenario on stderr: step index, kind, target and screenshot
pub fn print_failures(results: &[RunResult]) {
    for result in results.iter().filter(|r| !r.passed()) {
        let Some(reason) = &result.failure_reason else {
            print_error(&format!("{}: failed", result.scenario_name));
            continue;
        };

        let location = match (reason.step_index, reason.step_kind) {
            (Some(index), Some(kind)) => format!(
                "step {} ({}) on '{}'",
                index,
                kind,
                reason.target.as_deref().unwrap_or("-")
            ),
            _ => "before the first step".to_string(),
        };
        print_error(&format!("{}: {} failed: {}", result.scenario_name, location, reason.error));

        match &reason.screenshot {
            Some(path) => eprintln!("   screenshot: {}", path.display()),
            None => eprintln!("   screenshot: -"),
        }
        if let Some(note) = &reason.diagnostics_note {
            eprintln!("   {}", note.dimmed());
        }
    }
}

#[derive(Serialize)]
struct ScenarioRow<'a> {
    name: &'a str,
    description: &'a str,
    steps: usize,
    tags: &'a [String],
    on_failure: uiprobe_engine::FailurePolicy,
}

/// Print loaded scenarios
pub fn print_scenarios(scenarios: &[Scenario], format: OutputFormat) {
    if scenarios.is_empty() {
        println!("No scenarios found.");
        return;
    }

    let rows: Vec<ScenarioRow<'_>> = scenarios
        .iter()
        .map(|s| ScenarioRow {
            name: &s.name,
            description: &s.description,
            steps: s.steps.len(),
            tags: &s.tags,
            on_failure: s.on_failure,
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(vec!["Name", "Steps", "Tags", "On failure", "Description"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.steps.to_string(),
                    row.tags.join(", "),
                    format!("{:?}", row.on_failure),
                    row.description.to_string(),
                ]);
            }
            println!("{table}");
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
