//! Method and mode token normalization
//!
//! Method strings are matched case- and separator-insensitively against a
//! closed alias table. Matching is exact after normalization: partial or
//! misspelled names fail closed with `RUN-EXEC-0001`.
//!
//! Mode strings go through a small lower-case lookup and never fail here; an
//! unrecognized mode passes through unchanged so the dispatcher can report it
//! with full context.

use crate::error::{codes, DispatchResult, ErrorRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Canonical numerical method tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanonicalMethod {
    /// Finite-difference vorticity solver
    Fd,
    /// Pseudo-spectral solver
    Spectral,
    /// Finite-volume solver
    Fv,
    /// Shallow-water solver over variable bathymetry
    Bathymetry,
    /// Three-dimensional spectral solver
    Spectral3d,
    /// Explicit placeholder entry
    Placeholder,
}

impl CanonicalMethod {
    pub const ALL: [CanonicalMethod; 6] = [
        Self::Fd,
        Self::Spectral,
        Self::Fv,
        Self::Bathymetry,
        Self::Spectral3d,
        Self::Placeholder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fd => "FD",
            Self::Spectral => "SPECTRAL",
            Self::Fv => "FV",
            Self::Bathymetry => "BATHYMETRY",
            Self::Spectral3d => "SPECTRAL3D",
            Self::Placeholder => "PLACEHOLDER",
        }
    }

    /// Literal spellings accepted for this method.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Fd => &["FD", "Finite Difference", "Finite_Difference", "FiniteDifference"],
            Self::Spectral => &["SPECTRAL", "Spectral", "Pseudo Spectral", "PseudoSpectral", "FFT"],
            Self::Fv => &["FV", "Finite Volume", "Finite_Volume", "FiniteVolume"],
            Self::Bathymetry => &[
                "BATHYMETRY",
                "Bathymetry",
                "Variable Bathymetry",
                "VariableBathymetry",
                "Bathy",
            ],
            Self::Spectral3d => &["SPECTRAL3D", "Spectral 3D", "Spectral_3D", "3D Spectral"],
            Self::Placeholder => &["PLACEHOLDER", "Placeholder", "Stub"],
        }
    }

    /// Subdomain used for this method's `SOL-*` codes.
    pub fn error_subdomain(self) -> &'static str {
        match self {
            Self::Fd => "FD",
            Self::Spectral => "SP",
            Self::Fv => "FV",
            Self::Bathymetry => "BA",
            Self::Spectral3d => "SPTD",
            Self::Placeholder => "PH",
        }
    }

    /// Whether a solver exists for this method at all.
    pub fn is_implemented(self) -> bool {
        matches!(self, Self::Fd | Self::Bathymetry)
    }

    /// Modes an implemented method accepts.
    pub fn supported_modes(self) -> &'static [CanonicalMode] {
        match self {
            Self::Fd => &CanonicalMode::ALL,
            Self::Bathymetry => &[CanonicalMode::Evolution, CanonicalMode::Plotting],
            Self::Spectral | Self::Fv | Self::Spectral3d | Self::Placeholder => &[],
        }
    }

    pub fn supports(self, mode: CanonicalMode) -> bool {
        self.supported_modes().contains(&mode)
    }
}

impl fmt::Display for CanonicalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalMode {
    Evolution,
    Convergence,
    ParameterSweep,
    Plotting,
}

impl CanonicalMode {
    pub const ALL: [CanonicalMode; 4] = [
        Self::Evolution,
        Self::Convergence,
        Self::ParameterSweep,
        Self::Plotting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evolution => "Evolution",
            Self::Convergence => "Convergence",
            Self::ParameterSweep => "ParameterSweep",
            Self::Plotting => "Plotting",
        }
    }
}

impl fmt::Display for CanonicalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse: only the canonical spelling is accepted.
impl FromStr for CanonicalMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or(())
    }
}

/// Outcome of mode normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeToken {
    Canonical(CanonicalMode),
    /// Raw input, passed through untouched
    Unrecognized(String),
}

impl ModeToken {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Canonical(mode) => mode.as_str(),
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn canonical(&self) -> Option<CanonicalMode> {
        match self {
            Self::Canonical(mode) => Some(*mode),
            Self::Unrecognized(_) => None,
        }
    }
}

const MODE_ALIASES: &[(&str, CanonicalMode)] = &[
    ("evolution", CanonicalMode::Evolution),
    ("evolve", CanonicalMode::Evolution),
    ("solve", CanonicalMode::Evolution),
    ("convergence", CanonicalMode::Convergence),
    ("converge", CanonicalMode::Convergence),
    ("mesh", CanonicalMode::Convergence),
    ("parametersweep", CanonicalMode::ParameterSweep),
    ("parameter_sweep", CanonicalMode::ParameterSweep),
    ("sweep", CanonicalMode::ParameterSweep),
    ("param_sweep", CanonicalMode::ParameterSweep),
    ("plotting", CanonicalMode::Plotting),
    ("plot", CanonicalMode::Plotting),
    ("visualize", CanonicalMode::Plotting),
];

/// Trim, collapse whitespace/underscore/hyphen runs to one space, uppercase.
fn method_key(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Canonical method → accepted spellings, for error context and listings.
pub fn alias_table() -> BTreeMap<&'static str, Vec<&'static str>> {
    CanonicalMethod::ALL
        .into_iter()
        .map(|m| (m.as_str(), m.aliases().to_vec()))
        .collect()
}

/// Resolve a free-form method name to its canonical token.
pub fn normalize_method(raw: &str) -> DispatchResult<CanonicalMethod> {
    let key = method_key(raw);

    CanonicalMethod::ALL
        .into_iter()
        .find(|method| method.aliases().iter().any(|alias| method_key(alias) == key))
        .ok_or_else(|| {
            ErrorRecord::known(codes::UNKNOWN_METHOD, format!("Unknown method '{raw}'"))
                .with_context("input", raw)
                .with_context("normalized", key)
                .with_context(
                    "valid_methods",
                    CanonicalMethod::ALL.map(|m| m.as_str()).to_vec(),
                )
                .with_context("aliases", serde_json::json!(alias_table()))
        })
}

/// Resolve a free-form mode name; unknown input passes through unchanged.
pub fn normalize_mode(raw: &str) -> ModeToken {
    let key = raw.trim().to_lowercase();

    MODE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, mode)| ModeToken::Canonical(*mode))
        .unwrap_or_else(|| ModeToken::Unrecognized(raw.to_string()))
}
