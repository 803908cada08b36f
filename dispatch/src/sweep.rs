//! Parameter sweeps
//!
//! A sweep runs the bound solver once per value of one numeric parameter, in
//! input order, and aggregates three index-aligned arrays: quantity of
//! interest, wall time and sub-results. A failing point never shifts the
//! arrays; under the `continue` policy it leaves a `NaN` QoI and a failed
//! sub-result in its slot.
//!
//! Each point runs with its settings' `output_root` set to the study's
//! per-value figures directory, so sub-run outputs land inside the study.
//!
//! Files written under the study's data directory when `save_data` is set:
//! - `sweep_config.json`: request snapshot, before the first point
//! - `sweep_results.json`: the [`SweepResult`], after the last point

use crate::collaborators::{ComparisonPlan, MonitorContext, MonitorProgress, Paths, RunSummary};
use crate::config::{PointFailurePolicy, Settings};
use crate::dispatcher::{Dispatcher, Route};
use crate::error::{codes, DispatchResult, ErrorRecord};
use crate::identity::{attach_run_identifier, derive_run_id};
use crate::normalize::{CanonicalMethod, CanonicalMode};
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// QoI read from each sub-result unless the request names another field
pub const DEFAULT_QOI_FIELD: &str = "max_vorticity";

pub const SNAPSHOT_FILE: &str = "sweep_config.json";
pub const AGGREGATE_FILE: &str = "sweep_results.json";

/// Floor for measured wall times; a sub-run never reports zero time.
const MIN_WALL_TIME: f64 = 1e-9;

/// Directory label for one sweep value, e.g. `nu_0.000001` or `fd_cfl_0.25`.
pub fn point_label(parameter: &str, value: f64) -> String {
    format!("{}_{}", parameter.replace('.', "_"), value)
}

/// Aggregate of one parameter study
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub study_id: String,
    pub method: String,
    pub sweep_parameter: String,
    pub qoi_field: String,
    pub sweep_values: Vec<f64>,
    /// `NaN` (serialized as `null`) where a point failed or lacked the field
    #[serde(with = "nan_as_null")]
    pub qoi_array: Vec<f64>,
    /// Seconds, strictly positive
    pub wall_times: Vec<f64>,
    pub sub_results: Vec<Results>,
    /// Directories each point's solver reported; `None` for failed points
    #[serde(default)]
    pub sub_paths: Vec<Option<Paths>>,
    pub total_time: f64,
}

impl SweepResult {
    fn empty(study_id: &str, method: CanonicalMethod, parameter: &str, qoi_field: &str) -> Self {
        Self {
            study_id: study_id.to_string(),
            method: method.as_str().to_string(),
            sweep_parameter: parameter.to_string(),
            qoi_field: qoi_field.to_string(),
            sweep_values: Vec::new(),
            qoi_array: Vec::new(),
            wall_times: Vec::new(),
            sub_results: Vec::new(),
            sub_paths: Vec::new(),
            total_time: 0.0,
        }
    }

    fn push(
        &mut self,
        value: f64,
        qoi: f64,
        wall_time: f64,
        results: Results,
        paths: Option<Paths>,
    ) {
        self.sweep_values.push(value);
        self.qoi_array.push(qoi);
        self.wall_times.push(wall_time);
        self.sub_results.push(results);
        self.sub_paths.push(paths);
    }

    pub fn len(&self) -> usize {
        self.sweep_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweep_values.is_empty()
    }

    /// Whether every per-point array has one entry per sweep value.
    pub fn is_aligned(&self) -> bool {
        let n = self.sweep_values.len();
        self.qoi_array.len() == n
            && self.wall_times.len() == n
            && self.sub_results.len() == n
            && self.sub_paths.len() == n
    }

    /// Indices of points whose solver call failed.
    pub fn failed_points(&self) -> Vec<usize> {
        self.sub_results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_completed())
            .map(|(i, _)| i)
            .collect()
    }

    /// Study-level results handed back from a sweep dispatch and written to
    /// the ledger.
    pub fn summary_results(&self) -> Results {
        let nullable = |values: &[f64]| -> Vec<Option<f64>> {
            values.iter().map(|v| v.is_finite().then_some(*v)).collect()
        };

        Results {
            run_id: self.study_id.clone(),
            ..Results::new(self.method.clone())
        }
        .with_field("study_id", self.study_id.clone())
        .with_field("sweep_parameter", self.sweep_parameter.clone())
        .with_field("qoi_field", self.qoi_field.clone())
        .with_field("sweep_values", self.sweep_values.clone())
        .with_field("qoi_array", serde_json::json!(nullable(&self.qoi_array)))
        .with_field("wall_times", self.wall_times.clone())
        .with_field("total_time", self.total_time)
        .with_field("n_points", self.len())
        .with_field("n_failed", self.failed_points().len())
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| v.is_finite().then_some(*v))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[derive(Serialize)]
struct SweepSnapshot<'a> {
    run: &'a RunConfig,
    parameters: &'a Parameters,
    settings: &'a Settings,
}

/// Validated sweep request
#[derive(Debug)]
struct SweepPlan {
    parameter: String,
    values: Vec<f64>,
    qoi_field: String,
}

impl SweepPlan {
    /// Check every precondition before any solver call.
    fn validate(config: &RunConfig, params: &Parameters) -> DispatchResult<Self> {
        let parameter = config
            .sweep_parameter
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ErrorRecord::config(
                    codes::MISSING_SWEEP_PARAMETER,
                    "Parameter sweep has no sweep_parameter",
                )
                .with_context("present_fields", config.present_fields())
            })?;

        let values = config
            .sweep_values
            .as_ref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ErrorRecord::config(
                    codes::MISSING_SWEEP_VALUES,
                    "Parameter sweep has no sweep_values",
                )
                .with_context("sweep_parameter", parameter)
            })?;

        for (index, &value) in values.iter().enumerate() {
            params
                .clone()
                .set_field(parameter, value)
                .map_err(|e| e.with_context("index", index))?;
        }

        let qoi_field = config
            .qoi_field
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_QOI_FIELD);

        Ok(Self {
            parameter: parameter.to_string(),
            values: values.clone(),
            qoi_field: qoi_field.to_string(),
        })
    }
}

/// Runs one parameter study through a dispatcher's collaborators.
pub struct SweepOrchestrator<'a> {
    dispatcher: &'a Dispatcher,
    method: CanonicalMethod,
}

impl<'a> SweepOrchestrator<'a> {
    pub fn new(dispatcher: &'a Dispatcher, method: CanonicalMethod) -> Self {
        Self { dispatcher, method }
    }

    /// Run the study. `config`, `params` and `settings` are never modified;
    /// every point works on its own copies.
    pub fn run(
        &self,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> DispatchResult<(SweepResult, Paths)> {
        let plan = SweepPlan::validate(config, params)?;

        let study_id = config
            .study_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| derive_run_id(config));
        let study_config = RunConfig {
            method: Some(self.method.as_str().to_string()),
            mode: Some(CanonicalMode::ParameterSweep.as_str().to_string()),
            study_id: Some(study_id.clone()),
            ..config.clone()
        };

        let builder = &self.dispatcher.path_builder;
        let mut paths = builder.get_run_paths(
            self.method.as_str(),
            CanonicalMode::ParameterSweep.as_str(),
            &study_id,
        );
        builder.ensure_directories(&paths).map_err(|e| {
            ErrorRecord::io(
                codes::PATH_PROVISIONING_FAILED,
                format!("Could not provision sweep directories for '{study_id}'"),
                &e,
            )
            .with_context("base", paths.base.display().to_string())
        })?;

        if settings.save_data {
            let snapshot = SweepSnapshot {
                run: &study_config,
                parameters: params,
                settings,
            };
            write_json(&paths.data.join(SNAPSHOT_FILE), &snapshot).map_err(|e| {
                ErrorRecord::io(codes::SNAPSHOT_WRITE_FAILED, "Could not write sweep snapshot", &e)
            })?;
        }

        info!(
            study_id = %study_id,
            method = %self.method,
            parameter = %plan.parameter,
            points = plan.values.len(),
            "Parameter sweep started"
        );

        let monitor = &self.dispatcher.monitor;
        let mut ctx = monitor.start(&study_config, settings);
        let started = Instant::now();

        let outcome = self
            .run_points(&plan, &study_config, params, settings, &mut paths, &mut ctx)
            .and_then(|mut result| {
                result.total_time = started.elapsed().as_secs_f64().max(MIN_WALL_TIME);
                self.after_sweep(&result, &study_config, params, settings, &paths)?;
                Ok(result)
            });

        match outcome {
            Ok(result) => {
                monitor.stop(ctx, &RunSummary::completed(result.total_time));
                info!(
                    study_id = %study_id,
                    total_time = result.total_time,
                    failed = result.failed_points().len(),
                    "Parameter sweep finished"
                );
                Ok((result, paths))
            }
            Err(err) => {
                let elapsed = started.elapsed().as_secs_f64();
                monitor.stop(ctx, &RunSummary::failed(elapsed, err.code().to_string()));
                Err(err)
            }
        }
    }

    fn run_points(
        &self,
        plan: &SweepPlan,
        study_config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
        paths: &mut Paths,
        ctx: &mut MonitorContext,
    ) -> DispatchResult<SweepResult> {
        let study_id = study_config.study_id.as_deref().unwrap_or_default();
        let route = Route {
            method: self.method,
            mode: CanonicalMode::ParameterSweep,
        };
        let builder = &self.dispatcher.path_builder;
        let total = plan.values.len();
        let mut result = SweepResult::empty(study_id, self.method, &plan.parameter, &plan.qoi_field);

        for (index, &value) in plan.values.iter().enumerate() {
            let mut point_params = params.clone();
            point_params.set_field(&plan.parameter, value)?;

            let point_config = RunConfig {
                run_id: Some(format!("{study_id}_{:03}", index + 1)),
                ..study_config.clone()
            };

            let label = point_label(&plan.parameter, value);
            builder.add_parameter_dir(paths, &label);
            builder.ensure_directories(paths).map_err(|e| {
                ErrorRecord::io(
                    codes::PATH_PROVISIONING_FAILED,
                    format!("Could not provision directory for '{label}'"),
                    &e,
                )
            })?;

            let point_settings = Settings {
                output_root: paths
                    .parameter_dirs
                    .get(&label)
                    .cloned()
                    .unwrap_or_else(|| paths.figures.join(&label)),
                ..settings.clone()
            };

            let point_started = Instant::now();
            let outcome =
                self.dispatcher
                    .invoke_solver(route, &point_config, &point_params, &point_settings);
            let wall_time = point_started.elapsed().as_secs_f64().max(MIN_WALL_TIME);

            match outcome {
                Ok((results, point_paths)) => {
                    let results = attach_run_identifier(results, &point_config);
                    let qoi = results.scalar(&plan.qoi_field).unwrap_or(f64::NAN);
                    result.push(value, qoi, wall_time, results, Some(point_paths));
                }
                Err(err) => match settings.sweep.on_point_failure {
                    PointFailurePolicy::Continue => {
                        warn!(
                            study_id,
                            index,
                            value,
                            code = %err.code(),
                            "Sweep point failed; continuing"
                        );
                        let failed = attach_run_identifier(
                            Results::failed(self.method.as_str(), err),
                            &point_config,
                        );
                        result.push(value, f64::NAN, wall_time, failed, None);
                    }
                    PointFailurePolicy::Abort => {
                        warn!(study_id, index, value, code = %err.code(), "Sweep point failed; aborting");
                        return Err(err);
                    }
                },
            }

            self.dispatcher.monitor.update(
                ctx,
                &MonitorProgress::new(index + 1, total, format!("{label} done")),
            );
        }

        Ok(result)
    }

    /// Aggregate persistence, comparison rendering and the study ledger row.
    fn after_sweep(
        &self,
        result: &SweepResult,
        study_config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
        paths: &Paths,
    ) -> DispatchResult<()> {
        if settings.save_data {
            write_json(&paths.data.join(AGGREGATE_FILE), result).map_err(|e| {
                ErrorRecord::io(codes::AGGREGATE_WRITE_FAILED, "Could not write sweep results", &e)
            })?;
        }

        if settings.save_figures {
            if let Some(renderer) = &self.dispatcher.renderer {
                let plan =
                    ComparisonPlan::build(result, paths, settings.sweep.max_comparison_panels);
                match renderer.render(&plan, paths) {
                    Ok(files) => info!(files = files.len(), "Sweep comparisons rendered"),
                    Err(e) => warn!(error = %format!("{e:#}"), "Sweep comparison rendering failed"),
                }
            }
        }

        if settings.append_to_master {
            self.dispatcher.append_ledger(
                &result.study_id,
                study_config,
                params,
                &result.summary_results(),
            );
        }

        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
