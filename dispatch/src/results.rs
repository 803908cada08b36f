//! Solver results as seen by the core
//!
//! The core only reads `run_id`, `method`, `status` and whichever scalar field
//! a sweep uses as its quantity of interest. Everything else a solver reports
//! is carried through untouched in `fields`.

use crate::collaborators::ArtifactSummary;
use crate::error::ErrorRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// Canonical run identifier; never empty once returned by the core
    #[serde(default)]
    pub run_id: String,

    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub status: RunStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSummary>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,

    /// Solver-specific output
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Results {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    /// Placeholder for a run that produced no output.
    pub fn failed(method: impl Into<String>, error: ErrorRecord) -> Self {
        Self {
            method: method.into(),
            status: RunStatus::Failed,
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Numeric value of a solver field, if present.
    pub fn scalar(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
