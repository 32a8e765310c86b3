//! Command implementations

pub mod list;
pub mod run;
pub mod validate;

use uiprobe_engine::{ProbeError, ProbeResult, Scenario};

use crate::cli::SelectArgs;

/// Load scenarios from the given paths and apply the tag/name filters
pub fn load_scenarios(select: &SelectArgs) -> ProbeResult<Vec<Scenario>> {
    let mut scenarios = Scenario::load_paths(&select.paths)?;

    if let Some(tag) = &select.tag {
        scenarios = Scenario::filter_by_tag(scenarios, tag);
    }
    if let Some(name) = &select.name {
        scenarios.retain(|s| &s.name == name);
    }

    if scenarios.is_empty() {
        let searched = select
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ProbeError::NoScenarios(searched));
    }
    Ok(scenarios)
}
