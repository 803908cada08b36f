//! Physical and numerical parameters
//!
//! `Parameters` has value semantics: every sweep point works on its own clone.
//! Numeric fields are addressable by name or dotted path (`nu`, `fd.cfl`) so a
//! sweep can override exactly one of them.

use crate::error::{codes, DispatchResult, ErrorRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Finite-difference specific options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdOptions {
    /// Target Courant number
    pub cfl: f64,
    pub advection_scheme: String,
}

impl Default for FdOptions {
    fn default() -> Self {
        Self {
            cfl: 0.5,
            advection_scheme: "arakawa".to_string(),
        }
    }
}

/// Variable-bathymetry options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BathymetryOptions {
    /// Reference depth [m]
    pub depth: f64,
    /// Bed slope (dimensionless)
    pub slope: f64,
}

impl Default for BathymetryOptions {
    fn default() -> Self {
        Self {
            depth: 1.0,
            slope: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Domain length in x [m]
    pub lx: f64,
    /// Domain length in y [m]
    pub ly: f64,
    pub nx: u32,
    pub ny: u32,
    /// Time step [s]
    pub dt: f64,
    /// Final simulation time [s]
    pub t_final: f64,
    /// Kinematic viscosity [m^2/s]
    pub nu: f64,
    /// Vortex arrangement: Single, Grid, Circular, ...
    pub pattern: String,
    pub n_vortices: u32,
    /// Vortex circulation [m^2/s]
    pub circulation: f64,
    /// Initial vortex core radius [m]
    pub core_radius: f64,
    pub num_snapshots: u32,
    pub fd: FdOptions,
    pub bathymetry: BathymetryOptions,
    /// Keys this version does not model; preserved for the solver
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            lx: 10.0,
            ly: 10.0,
            nx: 128,
            ny: 128,
            dt: 0.001,
            t_final: 10.0,
            nu: 1e-4,
            pattern: "Single".to_string(),
            n_vortices: 1,
            circulation: 1.0,
            core_radius: 1.0,
            num_snapshots: 9,
            fd: FdOptions::default(),
            bathymetry: BathymetryOptions::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl Parameters {
    /// Read a numeric field by dotted path.
    pub fn get_field(&self, path: &str) -> Option<f64> {
        let tree = serde_json::to_value(self).ok()?;
        lookup(&tree, path)?.as_f64()
    }

    /// Every numeric field path, sorted.
    pub fn numeric_fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Ok(tree) = serde_json::to_value(self) {
            collect_numeric(&tree, "", &mut out);
        }
        out.sort();
        out
    }

    /// Override one existing numeric field.
    ///
    /// Fails with `CFG-SWEEP-0003` when the path does not name a numeric field
    /// and `CFG-SWEEP-0004` when the value does not fit it.
    pub fn set_field(&mut self, path: &str, value: f64) -> DispatchResult<()> {
        let mut tree = serde_json::to_value(&*self).map_err(|e| {
            ErrorRecord::config(
                codes::INVALID_SWEEP_VALUE,
                format!("Parameters could not be serialized: {e}"),
            )
        })?;

        let slot = path
            .split('.')
            .try_fold(&mut tree, |node, key| node.get_mut(key))
            .filter(|slot| slot.is_number())
            .ok_or_else(|| {
                ErrorRecord::config(
                    codes::UNKNOWN_SWEEP_PARAMETER,
                    format!("'{path}' is not a numeric parameter"),
                )
                .with_context("sweep_parameter", path)
                .with_context("numeric_fields", self.numeric_fields())
            })?;

        *slot = numeric_replacement(slot, value).map_err(|reason| {
            ErrorRecord::config(
                codes::INVALID_SWEEP_VALUE,
                format!("Value {value} cannot be assigned to '{path}': {reason}"),
            )
            .with_context("sweep_parameter", path)
            .with_context("value", value.to_string())
        })?;

        *self = serde_json::from_value(tree).map_err(|e| {
            ErrorRecord::config(
                codes::INVALID_SWEEP_VALUE,
                format!("Value {value} cannot be assigned to '{path}': {e}"),
            )
            .with_context("sweep_parameter", path)
        })?;

        Ok(())
    }
}

fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(tree, |node, key| node.get(key))
}

fn collect_numeric(node: &Value, prefix: &str, out: &mut Vec<String>) {
    if let Value::Object(map) = node {
        for (key, child) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            if child.is_number() {
                out.push(path);
            } else {
                collect_numeric(child, &path, out);
            }
        }
    }
}

/// Keep the JSON number kind of the slot: integer fields only take integral values.
fn numeric_replacement(slot: &Value, value: f64) -> Result<Value, &'static str> {
    if !value.is_finite() {
        return Err("value is not finite");
    }

    if slot.is_f64() {
        return Number::from_f64(value)
            .map(Value::Number)
            .ok_or("value is not representable");
    }

    if value.fract() != 0.0 {
        return Err("field is integral");
    }

    if slot.is_u64() {
        if value < 0.0 || value > u64::MAX as f64 {
            return Err("field is unsigned");
        }
        return Ok(Value::from(value as u64));
    }

    if value < i64::MIN as f64 || value > i64::MAX as f64 {
        return Err("value out of range");
    }
    Ok(Value::from(value as i64))
}
