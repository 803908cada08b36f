//! Comparison plans as plot-ready JSON
//!
//! No plotting backend is linked into the core. This renderer writes each
//! planned figure as a JSON document next to where the image would go, so an
//! external plotting step can pick them up.

use crate::collaborators::{ComparisonPlan, ComparisonRenderer, Paths};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPlanRenderer;

fn write(path: &Path, value: &impl Serialize) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize figure")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

impl ComparisonRenderer for JsonPlanRenderer {
    fn render(&self, plan: &ComparisonPlan, paths: &Paths) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        for series in &plan.series {
            written.push(write(&series.output.with_extension("json"), series)?);
        }
        if let Some(fields) = &plan.field_comparison {
            written.push(write(&fields.output.with_extension("json"), fields)?);
        }
        written.push(write(&paths.reports.join("comparison_plan.json"), plan)?);

        Ok(written)
    }
}
