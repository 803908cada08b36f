//! Collaborator seams of the dispatch core
//!
//! The core owns routing, error policy, identity and sweep aggregation.
//! Everything that touches numerics, the filesystem layout or the outside
//! world sits behind one of these traits. Default implementations live in
//! [`crate::adapters`].

pub mod finalizer;
pub mod ledger;
pub mod monitor;
pub mod paths;
pub mod render;
pub mod solver;

pub use finalizer::{ArtifactFinalizer, ArtifactSummary};
pub use ledger::RunLedger;
pub use monitor::{Monitor, MonitorContext, MonitorProgress, NullMonitor, RunSummary};
pub use paths::{PathBuilder, Paths};
pub use render::{ComparisonPlan, ComparisonRenderer, ComparisonSeries, FieldComparison, FieldPanel};
pub use solver::{Solver, SolverFailure};
