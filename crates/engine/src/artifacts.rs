//! Artifact layout
//!
//! ```text
//! <artifact_dir>/
//!   results.json
//!   <scenario>/
//!     <step>-<kind>.png
//!     <step>-<kind>.failure.json
//!     attempt-2/...            (retried scenarios)
//! ```

use std::path::{Path, PathBuf};

use crate::definition::StepKind;

pub const RESULTS_FILE: &str = "results.json";

/// Root of all artifacts of a run
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    /// Directory of one scenario attempt; attempts after the first get a subdirectory
    pub fn scenario(&self, name: &str, attempt: u32) -> ScenarioArtifacts {
        let mut dir = self.root.join(slug(name));
        if attempt > 1 {
            dir = dir.join(format!("attempt-{}", attempt));
        }
        ScenarioArtifacts { dir }
    }
}

/// Artifact paths of one scenario attempt
#[derive(Debug, Clone)]
pub struct ScenarioArtifacts {
    dir: PathBuf,
}

impl ScenarioArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn step_png(&self, index: usize, kind: StepKind) -> PathBuf {
        self.dir.join(format!("{}-{}.png", index, kind))
    }

    pub fn failure_json(&self, index: usize, kind: StepKind) -> PathBuf {
        self.dir.join(format!("{}-{}.failure.json", index, kind))
    }

    /// Write `bytes`, creating the directory on first use
    pub async fn write(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, bytes).await
    }
}

/// File-system safe form of a scenario name
pub fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches(|c| c == '-' || c == '.').to_string();
    if slug.is_empty() {
        "scenario".to_string()
    } else {
        slug
    }
}
