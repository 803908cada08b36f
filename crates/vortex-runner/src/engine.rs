//! Mock engine
//!
//! Deterministic stand-in for the numerical backend. Diagnostics come from
//! the closed-form decay of a single Lamb-Oseen vortex, so a full sweep runs
//! in milliseconds and gives monotone, checkable numbers.

use anyhow::Context;
use serde_json::{Map, Value};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use tracing::debug;
use vortex_dispatch::adapters::FsPathBuilder;
use vortex_dispatch::{
    derive_run_id, CanonicalMethod, CanonicalMode, Parameters, PathBuilder, Paths, Results,
    RunConfig, Settings, Solver, SolverFailure,
};

pub const ANALYSIS_FILE: &str = "analysis.json";

/// Resolution ladder for convergence mode, as fractions of the requested grid
const CONVERGENCE_LEVELS: [u32; 3] = [4, 2, 1];

/// Closed-form diagnostics of a decaying Lamb-Oseen vortex at `t_final`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambOseen {
    pub max_vorticity: f64,
    pub energy: f64,
    pub enstrophy: f64,
}

impl LambOseen {
    pub fn at(params: &Parameters) -> Self {
        let gamma = params.circulation;
        // Squared core radius after viscous spreading
        let a2 = params.core_radius.powi(2) + 4.0 * params.nu * params.t_final;
        let half_width = 0.5 * params.lx.min(params.ly);

        Self {
            max_vorticity: gamma / (PI * a2),
            energy: gamma.powi(2) / (8.0 * PI) * (half_width.powi(2) / a2).ln().max(0.0),
            enstrophy: gamma.powi(2) / (4.0 * PI * a2),
        }
    }
}

/// Solver backend that never integrates anything.
///
/// Run directories go under `settings.output_root` at call time, so a sweep
/// can point each sub-run at its own per-value directory.
pub struct MockEngine {
    method: CanonicalMethod,
}

impl MockEngine {
    pub fn new(method: CanonicalMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> CanonicalMethod {
        self.method
    }

    fn invalid_input(&self, message: String) -> SolverFailure {
        SolverFailure::coded(format!("SOL-{}-0004", self.method.error_subdomain()), message)
    }

    fn validate(&self, params: &Parameters) -> Result<(), SolverFailure> {
        let checks = [
            ("dt", params.dt),
            ("t_final", params.t_final),
            ("nx", f64::from(params.nx)),
            ("ny", f64::from(params.ny)),
        ];
        for (name, value) in checks {
            if value.is_nan() || value <= 0.0 {
                return Err(self.invalid_input(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(())
    }

    fn diagnostics(&self, mode: CanonicalMode, params: &Parameters) -> Map<String, Value> {
        let vortex = LambOseen::at(params);
        let mut fields = Map::new();
        fields.insert("max_vorticity".into(), vortex.max_vorticity.into());
        fields.insert("energy".into(), vortex.energy.into());
        fields.insert("enstrophy".into(), vortex.enstrophy.into());
        fields.insert(
            "time_steps".into(),
            ((params.t_final / params.dt).round() as u64).into(),
        );
        fields.insert("grid_size".into(), (u64::from(params.nx) * u64::from(params.ny)).into());

        if self.method == CanonicalMethod::Bathymetry {
            fields.insert("depth".into(), params.bathymetry.depth.into());
        }
        if mode == CanonicalMode::Convergence {
            fields.extend(convergence_fields(params));
        }
        fields
    }
}

/// Second-order error model on a ladder of coarsened grids.
fn convergence_fields(params: &Parameters) -> Map<String, Value> {
    let grids: Vec<u32> = CONVERGENCE_LEVELS
        .iter()
        .map(|div| (params.nx / div).max(1))
        .collect();
    let errors: Vec<f64> = grids
        .iter()
        .map(|&n| (params.lx / f64::from(n)).powi(2) * params.core_radius.recip())
        .collect();

    let order = match (errors.first(), errors.last(), grids.first(), grids.last()) {
        (Some(&coarse), Some(&fine), Some(&n0), Some(&n1)) if n1 > n0 && fine > 0.0 => {
            (coarse / fine).ln() / (f64::from(n1) / f64::from(n0)).ln()
        }
        _ => f64::NAN,
    };

    let mut fields = Map::new();
    fields.insert("convergence_grids".into(), grids.into());
    fields.insert("convergence_errors".into(), errors.into());
    fields.insert(
        "observed_order".into(),
        serde_json::Number::from_f64(order).map_or(Value::Null, Value::Number),
    );
    fields
}

fn write_analysis(data_dir: &Path, fields: &Map<String, Value>) -> anyhow::Result<PathBuf> {
    let path = data_dir.join(ANALYSIS_FILE);
    let text = serde_json::to_string_pretty(fields)?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

impl Solver for MockEngine {
    fn solve(
        &self,
        mode: CanonicalMode,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> Result<(Results, Paths), SolverFailure> {
        self.validate(params)?;

        let builder = FsPathBuilder::new(&settings.output_root);
        let run_id = derive_run_id(config);
        let paths = builder.get_run_paths(self.method.as_str(), mode.as_str(), &run_id);
        builder.ensure_directories(&paths)?;

        let fields = self.diagnostics(mode, params);
        if settings.save_data {
            let written = write_analysis(&paths.data, &fields)?;
            debug!(path = %written.display(), "Wrote analysis");
        }

        let mut results = Results::new(self.method.as_str());
        results.run_id = run_id;
        results.fields = fields;
        Ok((results, paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_in(dir: &TempDir) -> Settings {
        Settings {
            output_root: dir.path().to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_vorticity_decays_with_viscosity() {
        let mut params = Parameters::default();
        let inviscid = LambOseen::at(&Parameters {
            nu: 0.0,
            ..params.clone()
        });
        assert!((inviscid.max_vorticity - 1.0 / PI).abs() < 1e-12);

        params.nu = 1e-2;
        let viscous = LambOseen::at(&params);
        assert!(viscous.max_vorticity < inviscid.max_vorticity);
        assert!(viscous.enstrophy < inviscid.enstrophy);
    }

    #[test]
    fn test_evolution_writes_analysis_under_run_dir() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new(CanonicalMethod::Fd);
        let config = RunConfig::new("FD", "Evolution").with_run_id("r1");

        let (results, paths) = engine
            .solve(
                CanonicalMode::Evolution,
                &config,
                &Parameters::default(),
                &settings_in(&dir),
            )
            .unwrap();

        assert_eq!(results.run_id, "r1");
        assert_eq!(results.method, "FD");
        assert_eq!(results.scalar("time_steps"), Some(10_000.0));
        assert_eq!(results.scalar("grid_size"), Some(16_384.0));
        assert_eq!(paths.base, dir.path().join("FD/Evolution/r1"));

        let written: Map<String, Value> =
            serde_json::from_str(&std::fs::read_to_string(paths.data.join(ANALYSIS_FILE)).unwrap())
                .unwrap();
        assert_eq!(written.get("max_vorticity"), results.fields.get("max_vorticity"));
    }

    #[test]
    fn test_save_data_off_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new(CanonicalMethod::Fd);
        let settings = Settings {
            save_data: false,
            ..settings_in(&dir)
        };

        let (_, paths) = engine
            .solve(
                CanonicalMode::Evolution,
                &RunConfig::new("FD", "Evolution").with_run_id("quiet"),
                &Parameters::default(),
                &settings,
            )
            .unwrap();
        assert!(paths.data.is_dir());
        assert!(!paths.data.join(ANALYSIS_FILE).exists());
    }

    #[test]
    fn test_rejects_non_positive_inputs_with_taxonomy_code() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new(CanonicalMethod::Fd);
        let params = Parameters {
            dt: 0.0,
            ..Parameters::default()
        };

        let err = engine
            .solve(
                CanonicalMode::Evolution,
                &RunConfig::new("FD", "Evolution"),
                &params,
                &settings_in(&dir),
            )
            .unwrap_err();

        let record = err.into_record("FD", "Evolution");
        assert!(record.has_code("SOL-FD-0004"));
        assert!(record.message().contains("dt"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_bathymetry_uses_its_own_subdomain() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new(CanonicalMethod::Bathymetry);
        let params = Parameters {
            nx: 0,
            ..Parameters::default()
        };

        let record = engine
            .solve(
                CanonicalMode::Evolution,
                &RunConfig::new("BATHYMETRY", "Evolution"),
                &params,
                &settings_in(&dir),
            )
            .unwrap_err()
            .into_record("BATHYMETRY", "Evolution");
        assert_eq!(record.code().to_string(), "SOL-BA-0004");
    }

    #[test]
    fn test_convergence_reports_second_order() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new(CanonicalMethod::Fd);

        let (results, _) = engine
            .solve(
                CanonicalMode::Convergence,
                &RunConfig::new("FD", "Convergence").with_run_id("conv"),
                &Parameters::default(),
                &settings_in(&dir),
            )
            .unwrap();

        let order = results.scalar("observed_order").unwrap();
        assert!((order - 2.0).abs() < 1e-9);
        assert_eq!(
            results.fields["convergence_grids"],
            serde_json::json!([32, 64, 128])
        );
    }
}
