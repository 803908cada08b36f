//! Vortex dispatch core
//!
//! Turns loosely-specified run requests into routed solver invocations:
//!
//! - **Token normalization**: free-form method and mode names resolve to
//!   canonical tokens (`"Finite Difference"` → `FD`, `"solve"` → `Evolution`)
//! - **Error taxonomy**: every failure leaving the core is an [`ErrorRecord`]
//!   with a `DOMAIN-SUBDOMAIN-NNNN` code callers can branch on
//! - **Dispatch**: routing, a panic-guarded solver call and finalization,
//!   tracked by an explicit lifecycle state machine
//! - **Run identity**: every returned result carries a run id
//! - **Parameter sweeps**: one solver call per value with index-aligned
//!   QoI, wall-time and sub-result arrays
//!
//! Numerical solvers, directory layout, monitoring, the run ledger and
//! artifact finalization are collaborator traits in [`collaborators`], with
//! filesystem-backed defaults in [`adapters`].
//!
//! # Usage
//!
//! ```no_run
//! use vortex_dispatch::adapters::{FsPathBuilder, ManifestFinalizer};
//! use vortex_dispatch::{
//!     CanonicalMethod, CanonicalMode, Dispatcher, Parameters, Paths, Results, RunConfig,
//!     RunRequest, Settings, SolverFailure,
//! };
//!
//! let solver = |_: CanonicalMode,
//!               config: &RunConfig,
//!               _: &Parameters,
//!               settings: &Settings|
//!  -> Result<(Results, Paths), SolverFailure> {
//!     let run_id = config.run_id.clone().unwrap_or_default();
//!     let paths = Paths::under(settings.output_root.join(&run_id));
//!     Ok((Results::new("FD").with_field("max_vorticity", 0.3), paths))
//! };
//!
//! let mut request = RunRequest::load("request.toml")?;
//! let dispatcher = Dispatcher::new(FsPathBuilder::new(&request.settings.output_root))
//!     .with_solver(CanonicalMethod::Fd, solver)
//!     .with_finalizer(ManifestFinalizer::new());
//!
//! let outcome = dispatcher.dispatch(&mut request.run, &request.parameters, &request.settings)?;
//! println!("{}", outcome.results.run_id);
//! # Ok::<(), vortex_dispatch::ErrorRecord>(())
//! ```

pub mod adapters;
pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod normalize;
pub mod parameters;
pub mod request;
pub mod results;
pub mod sweep;

pub use collaborators::{
    ArtifactFinalizer, ArtifactSummary, ComparisonPlan, ComparisonRenderer, Monitor,
    MonitorContext, MonitorProgress, PathBuilder, Paths, RunLedger, RunSummary, Solver,
    SolverFailure,
};
pub use config::{PointFailurePolicy, Preset, Settings};
pub use dispatcher::{DispatchOutcome, Dispatcher, Route};
pub use error::{codes, DispatchResult, ErrorCode, ErrorDomain, ErrorRecord, FailureCause};
pub use identity::{attach_run_identifier, derive_run_id};
pub use lifecycle::{DispatchLifecycle, DispatchPhase, TransitionRecord};
pub use normalize::{normalize_method, normalize_mode, CanonicalMethod, CanonicalMode, ModeToken};
pub use parameters::Parameters;
pub use request::{RunConfig, RunRequest};
pub use results::{Results, RunStatus};
pub use sweep::{SweepOrchestrator, SweepResult};
