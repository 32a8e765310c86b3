//! `uiprobe list`

use anyhow::Result;

use crate::cli::SelectArgs;
use crate::output::{print_scenarios, OutputFormat};

use super::load_scenarios;

pub fn execute(select: SelectArgs, format: OutputFormat) -> Result<bool> {
    let scenarios = load_scenarios(&select)?;
    print_scenarios(&scenarios, format);
    Ok(true)
}
