//! Sweep comparison plans
//!
//! The core decides *what* to compare; a [`ComparisonRenderer`] decides how it
//! is drawn. Rendering is best-effort.

use crate::collaborators::Paths;
use crate::sweep::{point_label, SweepResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One x/y series against the sweep values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSeries {
    pub name: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    /// `None` marks a failed point
    pub y: Vec<Option<f64>>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPanel {
    pub label: String,
    pub run_id: String,
    /// Base directory the point's solver wrote to
    pub source_dir: PathBuf,
}

/// Small-multiple of the final fields, one panel per sweep value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub panels: Vec<FieldPanel>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPlan {
    pub study_id: String,
    pub sweep_parameter: String,
    pub series: Vec<ComparisonSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_comparison: Option<FieldComparison>,
}

impl ComparisonPlan {
    /// Plan QoI and wall-time curves, plus a field small-multiple when the
    /// sweep has at most `max_panels` values.
    pub fn build(result: &SweepResult, paths: &Paths, max_panels: usize) -> Self {
        let parameter = &result.sweep_parameter;
        let finite = |v: f64| v.is_finite().then_some(v);

        let series = vec![
            ComparisonSeries {
                name: "qoi".to_string(),
                x_label: parameter.clone(),
                y_label: result.qoi_field.clone(),
                x: result.sweep_values.clone(),
                y: result.qoi_array.iter().copied().map(finite).collect(),
                output: paths.figures.join(format!("qoi_vs_{parameter}.png")),
            },
            ComparisonSeries {
                name: "wall_time".to_string(),
                x_label: parameter.clone(),
                y_label: "wall time [s]".to_string(),
                x: result.sweep_values.clone(),
                y: result.wall_times.iter().copied().map(finite).collect(),
                output: paths.figures.join(format!("walltime_vs_{parameter}.png")),
            },
        ];

        let field_comparison = (result.sweep_values.len() <= max_panels).then(|| {
            let panels = result
                .sweep_values
                .iter()
                .zip(&result.sub_results)
                .zip(&result.sub_paths)
                .filter(|((_, sub), _)| sub.is_completed())
                .map(|((&value, sub), sub_paths)| {
                    let label = point_label(parameter, value);
                    let source_dir = match sub_paths {
                        Some(sub_paths) => sub_paths.base.clone(),
                        None => paths
                            .parameter_dirs
                            .get(&label)
                            .cloned()
                            .unwrap_or_else(|| paths.figures.join(&label)),
                    };
                    FieldPanel {
                        label,
                        run_id: sub.run_id.clone(),
                        source_dir,
                    }
                })
                .collect();
            FieldComparison {
                panels,
                output: paths.figures.join("field_comparison.png"),
            }
        });

        Self {
            study_id: result.study_id.clone(),
            sweep_parameter: parameter.clone(),
            series,
            field_comparison,
        }
    }
}

/// Draws comparison plans, returning the files it wrote.
pub trait ComparisonRenderer {
    fn render(&self, plan: &ComparisonPlan, paths: &Paths) -> anyhow::Result<Vec<PathBuf>>;
}
