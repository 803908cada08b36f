//! Default collaborator implementations backed by the local filesystem and
//! `tracing`.

pub mod fs_paths;
pub mod jsonl_ledger;
pub mod manifest;
pub mod plan_renderer;
pub mod tracing_monitor;

pub use fs_paths::FsPathBuilder;
pub use jsonl_ledger::{JsonlLedger, LedgerRow};
pub use manifest::{Manifest, ManifestEntry, ManifestFinalizer, MANIFEST_FILE};
pub use plan_renderer::JsonPlanRenderer;
pub use tracing_monitor::TracingMonitor;
