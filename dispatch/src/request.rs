//! Declarative run requests
//!
//! A request file is TOML with three tables:
//!
//! ```toml
//! [run]
//! method = "Finite Difference"
//! mode = "sweep"
//! ic_type = "Lamb-Oseen"
//! sweep_parameter = "nu"
//! sweep_values = [1e-6, 5e-6, 1e-5]
//!
//! [parameters]
//! nx = 64
//! ny = 64
//!
//! [settings]
//! output_root = "Results"
//! ```

use crate::config::Settings;
use crate::error::{codes, DispatchResult, ErrorRecord};
use crate::parameters::Parameters;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to run. `method` and `mode` are rewritten to canonical tokens by the
/// dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Initial condition family (Lamb-Oseen, Taylor-Green, ...)
    #[serde(default)]
    pub ic_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_parameter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_values: Option<Vec<f64>>,

    /// Results field used as the sweep quantity of interest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qoi_field: Option<String>,
}

impl RunConfig {
    pub fn new(method: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            mode: Some(mode.into()),
            ..Self::default()
        }
    }

    pub fn with_ic_type(mut self, ic_type: impl Into<String>) -> Self {
        self.ic_type = ic_type.into();
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_study_id(mut self, study_id: impl Into<String>) -> Self {
        self.study_id = Some(study_id.into());
        self
    }

    pub fn with_sweep(mut self, parameter: impl Into<String>, values: Vec<f64>) -> Self {
        self.sweep_parameter = Some(parameter.into());
        self.sweep_values = Some(values);
        self
    }

    /// Names of the fields that carry a non-empty value.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut fields = Vec::new();
        if text(&self.method) {
            fields.push("method");
        }
        if text(&self.mode) {
            fields.push("mode");
        }
        if !self.ic_type.trim().is_empty() {
            fields.push("ic_type");
        }
        if text(&self.run_id) {
            fields.push("run_id");
        }
        if text(&self.study_id) {
            fields.push("study_id");
        }
        if text(&self.sweep_parameter) {
            fields.push("sweep_parameter");
        }
        if self.sweep_values.is_some() {
            fields.push("sweep_values");
        }
        if text(&self.qoi_field) {
            fields.push("qoi_field");
        }
        fields
    }
}

/// A complete request: run selection, parameters and settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub parameters: Parameters,

    #[serde(default)]
    pub settings: Settings,
}

impl RunRequest {
    pub fn from_toml_str(text: &str) -> DispatchResult<Self> {
        toml::from_str(text).map_err(|e| {
            ErrorRecord::config(codes::REQUEST_LOAD_FAILED, format!("Invalid run request: {e}"))
        })
    }

    /// Load a request file.
    pub fn load(path: impl AsRef<Path>) -> DispatchResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ErrorRecord::config(
                codes::REQUEST_LOAD_FAILED,
                format!("Cannot read run request: {e}"),
            )
            .with_context("path", path.display().to_string())
        })?;

        Self::from_toml_str(&text)
            .map_err(|e| e.with_context("path", path.display().to_string()))
    }
}
