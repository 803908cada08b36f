//! Error taxonomy for the dispatch core
//!
//! Every failure that leaves the core is an [`ErrorRecord`]: a taxonomy code
//! (`DOMAIN-SUBDOMAIN-NNNN`), a human-readable message, a context mapping and
//! an optional cause. Callers branch on the code, never on the message.
//!
//! | Domain | Meaning                                              | Retry |
//! |--------|------------------------------------------------------|-------|
//! | `RUN`  | dispatch/execution faults                            | only `RUN-EXEC-0003` |
//! | `SOL`  | method or method/mode combination not available      | no    |
//! | `CFG`  | malformed request, sweep or solver configuration     | no    |
//! | `IO`   | persistence failures                                 | yes   |

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, ErrorRecord>;

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]+)-([A-Z]+)-(\d{4})$").expect("CODE_PATTERN regex should compile")
});

/// Well-known codes raised by the core.
pub mod codes {
    pub const UNKNOWN_METHOD: &str = "RUN-EXEC-0001";
    pub const UNKNOWN_MODE: &str = "RUN-EXEC-0002";
    pub const UNEXPECTED_FAILURE: &str = "RUN-EXEC-0003";
    pub const ILLEGAL_TRANSITION: &str = "RUN-EXEC-0004";

    pub const SPECTRAL_NOT_IMPLEMENTED: &str = "SOL-SP-0001";
    pub const FINITE_VOLUME_NOT_IMPLEMENTED: &str = "SOL-FV-0001";
    pub const SPECTRAL3D_NOT_IMPLEMENTED: &str = "SOL-SPTD-0001";
    pub const PLACEHOLDER_NOT_IMPLEMENTED: &str = "SOL-PH-0001";

    pub const MISSING_SWEEP_PARAMETER: &str = "CFG-SWEEP-0001";
    pub const MISSING_SWEEP_VALUES: &str = "CFG-SWEEP-0002";
    pub const UNKNOWN_SWEEP_PARAMETER: &str = "CFG-SWEEP-0003";
    pub const INVALID_SWEEP_VALUE: &str = "CFG-SWEEP-0004";
    pub const REQUEST_LOAD_FAILED: &str = "CFG-LOAD-0001";
    pub const UNKNOWN_PRESET: &str = "CFG-PRESET-0001";

    pub const PATH_PROVISIONING_FAILED: &str = "IO-PATH-0001";
    pub const SNAPSHOT_WRITE_FAILED: &str = "IO-SNAP-0001";
    pub const AGGREGATE_WRITE_FAILED: &str = "IO-AGG-0001";
}

/// Top-level taxonomy domain of an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorDomain {
    /// Dispatch and execution faults
    Run,
    /// Solver availability (unimplemented method or mode)
    Sol,
    /// Configuration errors
    Cfg,
    /// Persistence failures
    Io,
}

impl ErrorDomain {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Run => "RUN",
            Self::Sol => "SOL",
            Self::Cfg => "CFG",
            Self::Io => "IO",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "RUN" => Some(Self::Run),
            "SOL" => Some(Self::Sol),
            "CFG" => Some(Self::Cfg),
            "IO" => Some(Self::Io),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Reasons a raw string is not a taxonomy code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeParseError {
    #[error("error code '{0}' does not match DOMAIN-SUBDOMAIN-NNNN")]
    Malformed(String),

    #[error("error code '{code}' uses domain '{domain}' outside the taxonomy")]
    UnknownDomain { code: String, domain: String },
}

/// A validated taxonomy code such as `RUN-EXEC-0003`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    domain: ErrorDomain,
    subdomain: String,
    number: u16,
}

impl ErrorCode {
    /// Parse a raw code, accepting only the four taxonomy domains.
    pub fn parse(raw: &str) -> Result<Self, CodeParseError> {
        let caps = CODE_PATTERN
            .captures(raw)
            .ok_or_else(|| CodeParseError::Malformed(raw.to_string()))?;

        let domain =
            ErrorDomain::from_prefix(&caps[1]).ok_or_else(|| CodeParseError::UnknownDomain {
                code: raw.to_string(),
                domain: caps[1].to_string(),
            })?;

        let number = caps[3]
            .parse()
            .map_err(|_| CodeParseError::Malformed(raw.to_string()))?;

        Ok(Self {
            domain,
            subdomain: caps[2].to_string(),
            number,
        })
    }

    /// Build a code from parts known to be well-formed.
    pub(crate) fn from_parts(domain: ErrorDomain, subdomain: &str, number: u16) -> Self {
        debug_assert!(!subdomain.is_empty() && subdomain.bytes().all(|b| b.is_ascii_uppercase()));
        debug_assert!(number <= 9999);
        Self {
            domain,
            subdomain: subdomain.to_string(),
            number,
        }
    }

    /// Build one of the [`codes`] constants.
    pub(crate) fn known(code: &'static str) -> Self {
        match Self::parse(code) {
            Ok(parsed) => parsed,
            Err(e) => unreachable!("built-in code constant is malformed: {e}"),
        }
    }

    pub fn domain(&self) -> ErrorDomain {
        self.domain
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn number(&self) -> u16 {
        self.number
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.domain, self.subdomain, self.number)
    }
}

impl FromStr for ErrorCode {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for ErrorCode {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The original failure preserved under a wrapped error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCause {
    /// Identifier carried by the original failure, if it had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub message: String,

    /// Structured context of the original failure, when it had any
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,

    /// Lower-level causes, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
}

impl FailureCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            context: BTreeMap::new(),
            chain: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn from_error(err: &anyhow::Error) -> Self {
        Self {
            code: None,
            message: err.to_string(),
            context: BTreeMap::new(),
            chain: err.chain().skip(1).map(|e| e.to_string()).collect(),
        }
    }

    /// Keeps the record's code and context; its own cause is flattened into
    /// `chain`.
    pub fn from_record(record: &ErrorRecord) -> Self {
        let mut chain = Vec::new();
        if let Some(inner) = record.cause() {
            chain.push(inner.message.clone());
            chain.extend(inner.chain.iter().cloned());
        }
        Self {
            code: Some(record.code().to_string()),
            message: record.message().to_string(),
            context: record.context().clone(),
            chain,
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::new(format!("panic: {}", panic_message(payload.as_ref())))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Coded error surfaced by the dispatch core.
///
/// # Example
/// ```json
/// {
///   "code": "RUN-EXEC-0003",
///   "message": "Unexpected failure while executing FD/Evolution",
///   "context": { "method": "FD", "mode": "Evolution" },
///   "cause": { "message": "matrix is singular" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    code: ErrorCode,

    message: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    context: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    cause: Option<Box<FailureCause>>,
}

impl ErrorRecord {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Add context key-value pair
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause(mut self, cause: FailureCause) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn domain(&self) -> ErrorDomain {
        self.code.domain
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.context
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        self.cause.as_deref()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code == *code
    }

    /// `SOL` and `CFG` errors will fail the same way again; `RUN-EXEC-0003`
    /// and `IO` errors may succeed after investigation.
    pub fn is_retryable(&self) -> bool {
        match self.code.domain {
            ErrorDomain::Io => true,
            ErrorDomain::Run => self.has_code(codes::UNEXPECTED_FAILURE),
            ErrorDomain::Sol | ErrorDomain::Cfg => false,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"{}","message":"{}"}}"#, self.code, self.message)
        })
    }

    // ── Constructors for the core's own codes ──────────────────────────────

    pub(crate) fn known(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::known(code), message)
    }

    /// Wrap an unstructured failure exactly once.
    pub fn unexpected(method: &str, mode: &str, cause: FailureCause) -> Self {
        Self::known(
            codes::UNEXPECTED_FAILURE,
            format!("Unexpected failure while executing {method}/{mode}: {}", cause.message),
        )
        .with_context("method", method)
        .with_context("mode", mode)
        .with_cause(cause)
    }

    pub fn config(code: &'static str, message: impl Into<String>) -> Self {
        Self::known(code, message)
    }

    pub fn io(code: &'static str, message: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::known(code, message).with_cause(FailureCause::from_error(err))
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_taxonomy_codes() {
        let code = ErrorCode::parse("RUN-EXEC-0003").unwrap();
        assert_eq!(code.domain(), ErrorDomain::Run);
        assert_eq!(code.subdomain(), "EXEC");
        assert_eq!(code.number(), 3);
        assert_eq!(code.to_string(), "RUN-EXEC-0003");

        let code: ErrorCode = "SOL-SPTD-0001".parse().unwrap();
        assert_eq!(code.domain(), ErrorDomain::Sol);
    }

    #[test]
    fn test_reject_malformed_codes() {
        assert!(matches!(
            ErrorCode::parse("RUN-EXEC-3"),
            Err(CodeParseError::Malformed(_))
        ));
        assert!(matches!(
            ErrorCode::parse("run-exec-0001"),
            Err(CodeParseError::Malformed(_))
        ));
        assert!(matches!(
            ErrorCode::parse("MATLAB:undefinedFunction"),
            Err(CodeParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_reject_foreign_domain() {
        let err = ErrorCode::parse("NET-HTTP-0404").unwrap_err();
        assert_eq!(
            err,
            CodeParseError::UnknownDomain {
                code: "NET-HTTP-0404".into(),
                domain: "NET".into()
            }
        );
    }

    #[test]
    fn test_every_builtin_code_parses() {
        for code in [
            codes::UNKNOWN_METHOD,
            codes::UNKNOWN_MODE,
            codes::UNEXPECTED_FAILURE,
            codes::ILLEGAL_TRANSITION,
            codes::SPECTRAL_NOT_IMPLEMENTED,
            codes::FINITE_VOLUME_NOT_IMPLEMENTED,
            codes::SPECTRAL3D_NOT_IMPLEMENTED,
            codes::PLACEHOLDER_NOT_IMPLEMENTED,
            codes::MISSING_SWEEP_PARAMETER,
            codes::MISSING_SWEEP_VALUES,
            codes::UNKNOWN_SWEEP_PARAMETER,
            codes::INVALID_SWEEP_VALUE,
            codes::REQUEST_LOAD_FAILED,
            codes::UNKNOWN_PRESET,
            codes::PATH_PROVISIONING_FAILED,
            codes::SNAPSHOT_WRITE_FAILED,
            codes::AGGREGATE_WRITE_FAILED,
        ] {
            assert!(ErrorCode::parse(code).is_ok(), "{code} should parse");
        }
    }

    #[test]
    fn test_record_context_and_display() {
        let err = ErrorRecord::known(codes::UNKNOWN_MODE, "Mode missing")
            .with_context("present_fields", vec!["method"])
            .with_context("attempt", 2);

        assert_eq!(err.to_string(), "[RUN-EXEC-0002] Mode missing");
        assert_eq!(err.context().len(), 2);
        assert_eq!(err.context()["attempt"], 2);
        assert!(err.has_code("RUN-EXEC-0002"));
        assert_eq!(err.code(), "RUN-EXEC-0002");
    }

    #[test]
    fn test_unexpected_keeps_cause() {
        let source = anyhow::anyhow!("disk full").context("writing snapshot");
        let err = ErrorRecord::unexpected("FD", "Evolution", FailureCause::from_error(&source));

        assert!(err.has_code(codes::UNEXPECTED_FAILURE));
        assert_eq!(err.context()["method"], "FD");
        assert_eq!(err.context()["mode"], "Evolution");
        let cause = err.cause().unwrap();
        assert_eq!(cause.message, "writing snapshot");
        assert_eq!(cause.chain, vec!["disk full".to_string()]);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_structured_cause_keeps_context() {
        let inner = ErrorRecord::new(ErrorCode::parse("IO-DISK-0002").unwrap(), "disk full")
            .with_context("path", "/scratch/run1")
            .with_cause(FailureCause::new("ENOSPC"));
        let outer = ErrorRecord::unexpected("FD", "Evolution", FailureCause::from_record(&inner));

        let cause = outer.cause().unwrap();
        assert_eq!(cause.code.as_deref(), Some("IO-DISK-0002"));
        assert_eq!(cause.context["path"], "/scratch/run1");
        assert_eq!(cause.chain, vec!["ENOSPC"]);

        let json: serde_json::Value = serde_json::from_str(&outer.to_json()).unwrap();
        assert_eq!(json["cause"]["context"]["path"], "/scratch/run1");
    }

    #[test]
    fn test_retry_classification() {
        assert!(!ErrorRecord::known(codes::SPECTRAL_NOT_IMPLEMENTED, "x").is_retryable());
        assert!(!ErrorRecord::known(codes::MISSING_SWEEP_VALUES, "x").is_retryable());
        assert!(!ErrorRecord::known(codes::UNKNOWN_METHOD, "x").is_retryable());
        assert!(ErrorRecord::known(codes::AGGREGATE_WRITE_FAILED, "x").is_retryable());
    }

    #[test]
    fn test_panic_payloads() {
        let cause = FailureCause::from_panic(Box::new("index out of bounds"));
        assert_eq!(cause.message, "panic: index out of bounds");

        let cause = FailureCause::from_panic(Box::new(String::from("boom")));
        assert_eq!(cause.message, "panic: boom");

        let cause = FailureCause::from_panic(Box::new(42_u8));
        assert!(cause.message.contains("non-string"));
    }

    #[test]
    fn test_record_serialization() {
        let err = ErrorRecord::known(codes::UNKNOWN_METHOD, "Unknown method 'X'")
            .with_context("valid_methods", vec!["FD", "SPECTRAL"])
            .with_cause(FailureCause::new("lookup failed").with_code("LEGACY-1"));

        let json = serde_json::to_string(&err).unwrap();
        let restored: ErrorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, err);

        let parsed: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(parsed["code"], "RUN-EXEC-0001");
        assert_eq!(parsed["context"]["valid_methods"][1], "SPECTRAL");
    }

    #[test]
    fn test_deserialize_rejects_foreign_code() {
        let json = r#"{"code":"NET-HTTP-0404","message":"nope"}"#;
        assert!(serde_json::from_str::<ErrorRecord>(json).is_err());
    }
}
