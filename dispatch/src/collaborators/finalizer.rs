use crate::collaborators::Paths;
use crate::config::Settings;
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the finalizer recorded for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub manifest_path: PathBuf,
    pub file_count: usize,
    pub total_bytes: u64,
    pub generated_at: DateTime<Utc>,
}

/// Post-run artifact step for top-level runs.
///
/// Failures are reported to the dispatcher, which logs them and carries on;
/// they never fail the run.
pub trait ArtifactFinalizer {
    fn finalize(
        &self,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
        results: &Results,
        paths: &Paths,
    ) -> anyhow::Result<ArtifactSummary>;
}
