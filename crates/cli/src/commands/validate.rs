//! `uiprobe validate`

use anyhow::Result;

use crate::cli::SelectArgs;
use crate::output::{print_scenarios, print_success, OutputFormat};

use super::load_scenarios;

/// Loading already validates every scenario; errors surface as fatal
pub fn execute(select: SelectArgs, format: OutputFormat) -> Result<bool> {
    let scenarios = load_scenarios(&select)?;
    let steps: usize = scenarios.iter().map(|s| s.steps.len()).sum();

    match format {
        OutputFormat::Json => print_scenarios(&scenarios, format),
        OutputFormat::Table => print_success(&format!(
            "{} scenario(s) valid, {} step(s)",
            scenarios.len(),
            steps
        )),
    }
    Ok(true)
}
