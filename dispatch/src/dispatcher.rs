//! Dispatcher: routing, guarded execution and finalization
//!
//! One dispatch walks the [`DispatchLifecycle`]:
//!
//! 1. **Routing** resolves method and mode to canonical tokens (rewriting the
//!    caller's `RunConfig`) and rejects unavailable combinations before any
//!    solver is touched.
//! 2. **Executing** runs the bound solver inside a panic guard, or hands a
//!    `ParameterSweep` to the [`SweepOrchestrator`].
//! 3. **Finalizing** attaches the run identifier, then runs the optional
//!    artifact finalizer and ledger append. Neither of those can fail the run.

use crate::collaborators::{
    ArtifactFinalizer, ArtifactSummary, ComparisonRenderer, Monitor, MonitorProgress, NullMonitor,
    PathBuilder, Paths, RunLedger, RunSummary, Solver, SolverFailure,
};
use crate::config::Settings;
use crate::error::{codes, panic_message, DispatchResult, ErrorCode, ErrorDomain, ErrorRecord};
use crate::identity::attach_run_identifier;
use crate::lifecycle::{DispatchLifecycle, DispatchPhase, TransitionRecord};
use crate::normalize::{normalize_method, normalize_mode, CanonicalMethod, CanonicalMode};
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use crate::sweep::{SweepOrchestrator, SweepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Canonical method and mode a dispatch resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub method: CanonicalMethod,
    pub mode: CanonicalMode,
}

/// Everything a successful dispatch produced.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub results: Results,
    pub paths: Paths,
    pub route: Route,
    /// Present for `ParameterSweep` dispatches
    pub sweep: Option<SweepResult>,
    pub transitions: Vec<TransitionRecord>,
}

pub struct Dispatcher {
    pub(crate) solvers: BTreeMap<CanonicalMethod, Box<dyn Solver>>,
    pub(crate) path_builder: Box<dyn PathBuilder>,
    pub(crate) finalizer: Option<Box<dyn ArtifactFinalizer>>,
    pub(crate) monitor: Box<dyn Monitor>,
    pub(crate) ledger: Option<Box<dyn RunLedger>>,
    pub(crate) renderer: Option<Box<dyn ComparisonRenderer>>,
}

impl Dispatcher {
    /// A dispatcher with no solver backends bound.
    pub fn new(path_builder: impl PathBuilder + 'static) -> Self {
        Self {
            solvers: BTreeMap::new(),
            path_builder: Box::new(path_builder),
            finalizer: None,
            monitor: Box::new(NullMonitor),
            ledger: None,
            renderer: None,
        }
    }

    /// Bind the backend for one method, replacing any previous binding.
    pub fn with_solver(mut self, method: CanonicalMethod, solver: impl Solver + 'static) -> Self {
        self.solvers.insert(method, Box::new(solver));
        self
    }

    pub fn with_finalizer(mut self, finalizer: impl ArtifactFinalizer + 'static) -> Self {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    pub fn with_monitor(mut self, monitor: impl Monitor + 'static) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    pub fn with_ledger(mut self, ledger: impl RunLedger + 'static) -> Self {
        self.ledger = Some(Box::new(ledger));
        self
    }

    pub fn with_renderer(mut self, renderer: impl ComparisonRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    pub fn has_backend(&self, method: CanonicalMethod) -> bool {
        self.solvers.contains_key(&method)
    }

    /// Resolve method and mode, rewriting both in `config` to canonical tokens.
    ///
    /// Checks run in this order: method present, method known, method
    /// implemented, mode present, mode known, mode supported by the method,
    /// backend bound.
    pub fn route(&self, config: &mut RunConfig) -> DispatchResult<Route> {
        let present = config.present_fields();

        let raw_method = config
            .method
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                ErrorRecord::known(codes::UNKNOWN_METHOD, "Run configuration has no method")
                    .with_context("present_fields", present.clone())
            })?;
        let method = normalize_method(raw_method)?;
        config.method = Some(method.as_str().to_string());

        if !method.is_implemented() {
            return Err(sol_error(
                method,
                1,
                format!("{method} solver is not implemented"),
            ));
        }

        let raw_mode = config
            .mode
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                ErrorRecord::known(codes::UNKNOWN_MODE, "Run configuration has no mode")
                    .with_context("present_fields", present.clone())
                    .with_context("method", method.as_str())
            })?;
        let token = normalize_mode(raw_mode);
        let mode = token.canonical().ok_or_else(|| {
            ErrorRecord::known(codes::UNKNOWN_MODE, format!("Unknown mode '{raw_mode}'"))
                .with_context("input", token.as_str())
                .with_context("method", method.as_str())
                .with_context(
                    "valid_modes",
                    CanonicalMode::ALL.map(|m| m.as_str()).to_vec(),
                )
        })?;
        config.mode = Some(mode.as_str().to_string());

        if !method.supports(mode) {
            return Err(sol_error(
                method,
                2,
                format!("{method} does not support {mode} mode"),
            )
            .with_context("mode", mode.as_str())
            .with_context(
                "supported_modes",
                method
                    .supported_modes()
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>(),
            ));
        }

        if !self.has_backend(method) {
            return Err(sol_error(
                method,
                3,
                format!("No {method} solver backend is bound"),
            )
            .with_context("mode", mode.as_str()));
        }

        Ok(Route { method, mode })
    }

    /// Route, execute and finalize one run.
    ///
    /// On success `config` holds canonical method and mode tokens and the
    /// returned results carry a non-empty run id.
    pub fn dispatch(
        &self,
        config: &mut RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> DispatchResult<DispatchOutcome> {
        let mut lifecycle = DispatchLifecycle::new();

        match self.run_phases(&mut lifecycle, config, params, settings) {
            Ok((results, paths, route, sweep)) => {
                info!(
                    run_id = %results.run_id,
                    lifecycle = %lifecycle.summary(),
                    "Dispatch completed"
                );
                Ok(DispatchOutcome {
                    results,
                    paths,
                    route,
                    sweep,
                    transitions: lifecycle.into_transitions(),
                })
            }
            Err(err) => {
                lifecycle.fail(&err);
                warn!(
                    code = %err.code(),
                    message = %err.message(),
                    lifecycle = %lifecycle.summary(),
                    "Dispatch failed"
                );
                Err(err)
            }
        }
    }

    fn run_phases(
        &self,
        lifecycle: &mut DispatchLifecycle,
        config: &mut RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> DispatchResult<(Results, Paths, Route, Option<SweepResult>)> {
        let route = self.route(config)?;
        info!(method = %route.method, mode = %route.mode, "Dispatch routed");

        lifecycle.advance(DispatchPhase::Executing, None)?;
        let (results, paths, sweep) = if route.mode == CanonicalMode::ParameterSweep {
            let orchestrator = SweepOrchestrator::new(self, route.method);
            let (sweep, paths) = orchestrator.run(config, params, settings)?;
            (sweep.summary_results(), paths, Some(sweep))
        } else {
            let (results, paths) = self.monitored_run(route, config, params, settings)?;
            (results, paths, None)
        };

        lifecycle.advance(DispatchPhase::Finalizing, None)?;
        let mut results = attach_run_identifier(results, config);
        results.artifacts = self.finalize_artifacts(config, params, settings, &results, &paths);

        if sweep.is_none() && settings.append_to_master {
            self.append_ledger(&results.run_id, config, params, &results);
        }

        lifecycle.advance(DispatchPhase::Completed, None)?;
        Ok((results, paths, route, sweep))
    }

    /// Single solver call bracketed by the monitor.
    fn monitored_run(
        &self,
        route: Route,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> DispatchResult<(Results, Paths)> {
        let mut ctx = self.monitor.start(config, settings);
        let started = Instant::now();

        let outcome = self.invoke_solver(route, config, params, settings);

        let elapsed = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(_) => {
                self.monitor
                    .update(&mut ctx, &MonitorProgress::new(1, 1, route.mode.as_str()));
                self.monitor.stop(ctx, &RunSummary::completed(elapsed));
            }
            Err(err) => self
                .monitor
                .stop(ctx, &RunSummary::failed(elapsed, err.code().to_string())),
        }
        outcome
    }

    /// Call the bound solver inside the execution guard.
    ///
    /// Taxonomy errors come back unchanged; anything else, panics included,
    /// is wrapped once into `RUN-EXEC-0003`.
    pub(crate) fn invoke_solver(
        &self,
        route: Route,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> DispatchResult<(Results, Paths)> {
        let solver = self.solvers.get(&route.method).ok_or_else(|| {
            sol_error(
                route.method,
                3,
                format!("No {} solver backend is bound", route.method),
            )
        })?;

        debug!(method = %route.method, mode = %route.mode, run_id = ?config.run_id, "Invoking solver");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            solver.solve(route.mode, config, params, settings)
        }))
        .unwrap_or_else(|payload| Err(SolverFailure::Panicked(panic_message(payload.as_ref()))));

        outcome.map_err(|failure| {
            let record = failure.into_record(route.method.as_str(), route.mode.as_str());
            warn!(
                method = %route.method,
                mode = %route.mode,
                code = %record.code(),
                "Solver failed"
            );
            record
        })
    }

    fn finalize_artifacts(
        &self,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
        results: &Results,
        paths: &Paths,
    ) -> Option<ArtifactSummary> {
        let finalizer = self.finalizer.as_ref()?;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            finalizer.finalize(config, params, settings, results, paths)
        }));

        match outcome {
            Ok(Ok(summary)) => {
                info!(
                    run_id = %results.run_id,
                    manifest = %summary.manifest_path.display(),
                    files = summary.file_count,
                    "Artifacts finalized"
                );
                Some(summary)
            }
            Ok(Err(e)) => {
                warn!(run_id = %results.run_id, error = %format!("{e:#}"), "Artifact finalization failed");
                None
            }
            Err(payload) => {
                warn!(
                    run_id = %results.run_id,
                    panic = %panic_message(payload.as_ref()),
                    "Artifact finalizer panicked"
                );
                None
            }
        }
    }

    /// Best-effort ledger row.
    pub(crate) fn append_ledger(
        &self,
        run_id: &str,
        config: &RunConfig,
        params: &Parameters,
        results: &Results,
    ) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        if let Err(e) = ledger.append_run(run_id, config, params, results) {
            warn!(run_id, error = %format!("{e:#}"), "Failed to append ledger row");
        }
    }
}

/// `SOL-<method>-<number>` error for an unavailable method or mode.
fn sol_error(method: CanonicalMethod, number: u16, message: String) -> ErrorRecord {
    let code = ErrorCode::from_parts(ErrorDomain::Sol, method.error_subdomain(), number);
    ErrorRecord::new(code, message).with_context("method", method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct NoPaths;

    impl PathBuilder for NoPaths {
        fn get_run_paths(&self, method: &str, mode: &str, run_id: &str) -> Paths {
            Paths::under(format!("/virtual/{method}/{mode}/{run_id}"))
        }

        fn ensure_directories(&self, _paths: &Paths) -> anyhow::Result<()> {
            Ok(())
        }

        fn add_parameter_dir(&self, paths: &mut Paths, name: &str) {
            let dir = paths.figures.join(name);
            paths.parameter_dirs.insert(name.to_string(), dir);
        }
    }

    fn counting_solver(calls: Rc<Cell<usize>>) -> impl Solver {
        move |mode: CanonicalMode,
              _: &RunConfig,
              _: &Parameters,
              _: &Settings|
              -> Result<(Results, Paths), SolverFailure> {
            calls.set(calls.get() + 1);
            Ok((
                Results::new("FD").with_field("mode_seen", mode.as_str()),
                Paths::under("/virtual/run"),
            ))
        }
    }

    fn quiet_settings() -> Settings {
        Settings {
            append_to_master: false,
            save_data: false,
            save_figures: false,
            ..Settings::default()
        }
    }

    #[test]
    fn test_route_rewrites_tokens() {
        let dispatcher = Dispatcher::new(NoPaths).with_solver(
            CanonicalMethod::Fd,
            counting_solver(Rc::new(Cell::new(0))),
        );
        let mut config = RunConfig::new("finite_difference", " Solve ");
        let route = dispatcher.route(&mut config).unwrap();

        assert_eq!(route.method, CanonicalMethod::Fd);
        assert_eq!(route.mode, CanonicalMode::Evolution);
        assert_eq!(config.method.as_deref(), Some("FD"));
        assert_eq!(config.mode.as_deref(), Some("Evolution"));
    }

    #[test]
    fn test_route_error_order() {
        let dispatcher = Dispatcher::new(NoPaths);

        let mut config = RunConfig::default();
        let err = dispatcher.route(&mut config).unwrap_err();
        assert!(err.has_code(codes::UNKNOWN_METHOD));

        let mut config = RunConfig {
            method: Some("Spectral".into()),
            ..RunConfig::default()
        };
        assert!(dispatcher
            .route(&mut config)
            .unwrap_err()
            .has_code(codes::SPECTRAL_NOT_IMPLEMENTED));

        let mut config = RunConfig {
            method: Some("FD".into()),
            ..RunConfig::default()
        };
        let err = dispatcher.route(&mut config).unwrap_err();
        assert!(err.has_code(codes::UNKNOWN_MODE));
        assert_eq!(err.context()["present_fields"][0], "method");

        let mut config = RunConfig::new("FD", "animate");
        let err = dispatcher.route(&mut config).unwrap_err();
        assert!(err.has_code(codes::UNKNOWN_MODE));
        assert_eq!(err.context()["input"], "animate");
        assert_eq!(err.context()["valid_modes"].as_array().unwrap().len(), 4);

        let mut config = RunConfig::new("Bathy", "sweep");
        let err = dispatcher.route(&mut config).unwrap_err();
        assert!(err.has_code("SOL-BA-0002"));
        assert_eq!(err.domain(), ErrorDomain::Sol);

        let mut config = RunConfig::new("FD", "evolve");
        let err = dispatcher.route(&mut config).unwrap_err();
        assert!(err.has_code("SOL-FD-0003"));
    }

    #[test]
    fn test_dispatch_records_transitions() {
        let calls = Rc::new(Cell::new(0));
        let dispatcher =
            Dispatcher::new(NoPaths).with_solver(CanonicalMethod::Fd, counting_solver(calls.clone()));

        let mut config = RunConfig::new("Finite Difference", "solve").with_run_id("R-1");
        let outcome = dispatcher
            .dispatch(&mut config, &Parameters::default(), &quiet_settings())
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(outcome.results.run_id, "R-1");
        assert_eq!(outcome.results.fields["mode_seen"], "Evolution");
        assert!(outcome.results.artifacts.is_none());
        let phases: Vec<_> = outcome.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            phases,
            vec![
                DispatchPhase::Executing,
                DispatchPhase::Finalizing,
                DispatchPhase::Completed
            ]
        );
    }

    #[test]
    fn test_panicking_solver_is_wrapped() {
        let dispatcher = Dispatcher::new(NoPaths).with_solver(
            CanonicalMethod::Fd,
            |_: CanonicalMode, _: &RunConfig, _: &Parameters, _: &Settings| -> Result<(Results, Paths), SolverFailure> {
                panic!("grid too coarse")
            },
        );

        let mut config = RunConfig::new("FD", "Evolution");
        let err = dispatcher
            .dispatch(&mut config, &Parameters::default(), &quiet_settings())
            .unwrap_err();

        assert!(err.has_code(codes::UNEXPECTED_FAILURE));
        assert_eq!(err.context()["method"], "FD");
        assert!(err.cause().unwrap().message.contains("grid too coarse"));
    }
}
