//! Runtime settings and configuration presets

use crate::error::{codes, DispatchResult, ErrorRecord};
use crate::parameters::Parameters;
use crate::request::RunConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Ledger file name used when no explicit path is configured
pub const DEFAULT_LEDGER_FILE: &str = "master_runs.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub enabled: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// What a sweep does when one of its points fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointFailurePolicy {
    /// Record the failure, fill the slot with NaN, keep going
    #[default]
    Continue,
    /// Stop the study with the point's error
    Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub on_point_failure: PointFailurePolicy,
    /// Largest sweep that still gets a field small-multiple
    pub max_comparison_panels: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            on_point_failure: PointFailurePolicy::Continue,
            max_comparison_panels: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// IO, monitoring and logging configuration. Read-only during a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the run directory tree
    pub output_root: PathBuf,
    pub save_data: bool,
    pub save_figures: bool,
    /// Append one ledger row per top-level run or study
    pub append_to_master: bool,
    /// Defaults to `<output_root>/master_runs.jsonl`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
    pub monitoring: MonitorSettings,
    pub sweep: SweepSettings,
    pub logging: LoggingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("Results"),
            save_data: true,
            save_figures: true,
            append_to_master: true,
            ledger_path: None,
            monitoring: MonitorSettings::default(),
            sweep: SweepSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env();
        settings
    }

    /// Overlay `VORTEX_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(root) = std::env::var("VORTEX_OUTPUT_ROOT") {
            self.output_root = PathBuf::from(root);
        }
        if let Ok(path) = std::env::var("VORTEX_LEDGER_PATH") {
            self.ledger_path = Some(PathBuf::from(path));
        }
        if let Ok(val) = std::env::var("VORTEX_APPEND_TO_MASTER") {
            self.append_to_master = flag(&val);
        }
        if let Ok(val) = std::env::var("VORTEX_MONITORING") {
            self.monitoring.enabled = flag(&val);
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.output_root.join(DEFAULT_LEDGER_FILE))
    }
}

fn flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Named starting points for common studies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    QuickTest,
    Standard,
    HighResolution,
    ConvergenceStudy,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Self::QuickTest,
        Self::Standard,
        Self::HighResolution,
        Self::ConvergenceStudy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::QuickTest => "quick-test",
            Self::Standard => "standard",
            Self::HighResolution => "high-resolution",
            Self::ConvergenceStudy => "convergence-study",
        }
    }

    /// Look up a preset; `Quick Test`, `quick_test` and `quick-test` are the same.
    pub fn from_name(raw: &str) -> DispatchResult<Self> {
        let key = raw
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();

        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == key)
            .ok_or_else(|| {
                ErrorRecord::config(codes::UNKNOWN_PRESET, format!("Unknown preset '{raw}'"))
                    .with_context("input", raw)
                    .with_context(
                        "valid_presets",
                        Self::ALL.iter().map(|p| p.name()).collect::<Vec<_>>(),
                    )
            })
    }

    fn values(self) -> PresetValues {
        let base = PresetValues {
            method: "Finite Difference",
            ic_type: "Lamb-Oseen",
            pattern: "Single",
            grid: 128,
            t_final: 10.0,
            n_vortices: None,
            dt: None,
        };
        match self {
            Self::QuickTest => PresetValues {
                grid: 64,
                t_final: 1.0,
                ..base
            },
            Self::Standard => PresetValues {
                pattern: "Grid",
                n_vortices: Some(4),
                ..base
            },
            Self::HighResolution => PresetValues {
                method: "Spectral",
                pattern: "Circular",
                grid: 256,
                n_vortices: Some(6),
                ..base
            },
            Self::ConvergenceStudy => PresetValues {
                ic_type: "Taylor-Green",
                t_final: 1.0,
                dt: Some(1e-4),
                ..base
            },
        }
    }

    /// Values this preset sets, keyed the way a request file names them.
    pub fn overrides(self) -> Value {
        let values = self.values();
        let mut out = json!({
            "method": values.method,
            "ic_type": values.ic_type,
            "pattern": values.pattern,
            "nx": values.grid,
            "ny": values.grid,
            "t_final": values.t_final,
        });
        if let Some(n) = values.n_vortices {
            out["n_vortices"] = n.into();
        }
        if let Some(dt) = values.dt {
            out["dt"] = dt.into();
        }
        out
    }

    /// Overwrite the preset's fields in `config` and `params`.
    pub fn apply(self, config: &mut RunConfig, params: &mut Parameters) {
        let values = self.values();
        config.method = Some(values.method.to_string());
        config.ic_type = values.ic_type.to_string();
        params.pattern = values.pattern.to_string();
        params.nx = values.grid;
        params.ny = values.grid;
        params.t_final = values.t_final;
        if let Some(n) = values.n_vortices {
            params.n_vortices = n;
        }
        if let Some(dt) = values.dt {
            params.dt = dt;
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The fields a preset sets; `None` leaves the request's value alone.
#[derive(Debug, Clone, Copy)]
struct PresetValues {
    method: &'static str,
    ic_type: &'static str,
    pattern: &'static str,
    grid: u32,
    t_final: f64,
    n_vortices: Option<u32>,
    dt: Option<f64>,
}
