//! Solver seam and the failure contract it reports through

use crate::collaborators::Paths;
use crate::config::Settings;
use crate::error::{ErrorCode, ErrorRecord, FailureCause};
use crate::normalize::CanonicalMode;
use crate::parameters::Parameters;
use crate::request::RunConfig;
use crate::results::Results;
use thiserror::Error;

/// How a solver invocation failed.
///
/// The dispatcher converts every variant to an [`ErrorRecord`] with
/// [`SolverFailure::into_record`]; that is the only place the
/// structured-versus-unstructured rule is applied.
#[derive(Debug, Error)]
pub enum SolverFailure {
    /// Already carries a taxonomy code; propagated unchanged
    #[error("{0}")]
    Taxonomy(ErrorRecord),

    /// Carries an identifier that is not a taxonomy code
    #[error("{identifier}: {message}")]
    Foreign { identifier: String, message: String },

    /// Carries no identifier at all
    #[error(transparent)]
    Unstructured(#[from] anyhow::Error),

    /// The solver panicked; holds the panic message
    #[error("solver panicked: {0}")]
    Panicked(String),
}

impl SolverFailure {
    /// Build a failure from a raw identifier, keeping it as a taxonomy error
    /// only when the identifier parses into one.
    pub fn coded(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let message = message.into();
        match ErrorCode::parse(&identifier) {
            Ok(code) => Self::Taxonomy(ErrorRecord::new(code, message)),
            Err(_) => Self::Foreign {
                identifier,
                message,
            },
        }
    }

    pub fn into_record(self, method: &str, mode: &str) -> ErrorRecord {
        match self {
            Self::Taxonomy(record) => record,
            Self::Foreign {
                identifier,
                message,
            } => ErrorRecord::unexpected(
                method,
                mode,
                FailureCause::new(message).with_code(identifier),
            ),
            Self::Unstructured(err) => {
                ErrorRecord::unexpected(method, mode, FailureCause::from_error(&err))
            }
            Self::Panicked(message) => {
                ErrorRecord::unexpected(method, mode, FailureCause::new(format!("panic: {message}")))
            }
        }
    }
}

impl From<ErrorRecord> for SolverFailure {
    fn from(record: ErrorRecord) -> Self {
        Self::Taxonomy(record)
    }
}

/// Numerical backend for one method.
///
/// Implementations may write under the returned [`Paths`]; they never see
/// un-normalized method or mode tokens.
pub trait Solver {
    fn solve(
        &self,
        mode: CanonicalMode,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> Result<(Results, Paths), SolverFailure>;
}

impl<F> Solver for F
where
    F: Fn(CanonicalMode, &RunConfig, &Parameters, &Settings) -> Result<(Results, Paths), SolverFailure>,
{
    fn solve(
        &self,
        mode: CanonicalMode,
        config: &RunConfig,
        params: &Parameters,
        settings: &Settings,
    ) -> Result<(Results, Paths), SolverFailure> {
        self(mode, config, params, settings)
    }
}
