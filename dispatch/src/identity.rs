//! Run identifiers
//!
//! Priority: an id the solver already set, then `RunConfig.run_id`, then
//! `RunConfig.study_id`, then a local wall-clock timestamp.

use crate::request::RunConfig;
use crate::results::Results;
use chrono::{DateTime, Local};

/// `yyyyMMdd_HHmmss`
pub const RUN_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp_run_id(at: DateTime<Local>) -> String {
    at.format(RUN_ID_FORMAT).to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Identifier a run with this config would get right now.
pub fn derive_run_id(config: &RunConfig) -> String {
    derive_run_id_at(config, Local::now())
}

pub fn derive_run_id_at(config: &RunConfig, now: DateTime<Local>) -> String {
    non_empty(config.run_id.as_deref())
        .or_else(|| non_empty(config.study_id.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| timestamp_run_id(now))
}

/// Make sure `results` carries a run id and method. Idempotent.
pub fn attach_run_identifier(results: Results, config: &RunConfig) -> Results {
    attach_run_identifier_at(results, config, Local::now())
}

pub fn attach_run_identifier_at(
    mut results: Results,
    config: &RunConfig,
    now: DateTime<Local>,
) -> Results {
    if results.run_id.trim().is_empty() {
        results.run_id = derive_run_id_at(config, now);
    }
    if results.method.trim().is_empty() {
        if let Some(method) = non_empty(config.method.as_deref()) {
            results.method = method.to_string();
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 3).unwrap()
    }

    #[test]
    fn test_existing_run_id_is_kept() {
        let results = Results {
            run_id: "X".into(),
            ..Results::new("FD")
        };
        let config = RunConfig::default().with_run_id("Y").with_study_id("S1");
        assert_eq!(attach_run_identifier(results, &config).run_id, "X");
    }

    #[test]
    fn test_priority_order() {
        let now = fixed_now();
        let config = RunConfig::default().with_run_id("R1").with_study_id("S1");
        assert_eq!(attach_run_identifier_at(Results::default(), &config, now).run_id, "R1");

        let config = RunConfig::default().with_study_id("S1");
        assert_eq!(attach_run_identifier_at(Results::default(), &config, now).run_id, "S1");

        let config = RunConfig {
            run_id: Some("  ".into()),
            ..RunConfig::default()
        };
        assert_eq!(
            attach_run_identifier_at(Results::default(), &config, now).run_id,
            "20240309_070503"
        );
    }

    #[test]
    fn test_timestamp_format() {
        let id = attach_run_identifier(Results::default(), &RunConfig::default()).run_id;
        let pattern = Regex::new(r"^\d{8}_\d{6}$").unwrap();
        assert!(pattern.is_match(&id), "unexpected run id {id}");
    }

    #[test]
    fn test_idempotent() {
        let config = RunConfig::new("FD", "Evolution");
        let once = attach_run_identifier_at(Results::default(), &config, fixed_now());
        let later = fixed_now() + chrono::Duration::hours(1);
        let twice = attach_run_identifier_at(once.clone(), &config, later);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fills_empty_method() {
        let config = RunConfig::new("BATHYMETRY", "Plotting");
        let results = attach_run_identifier(Results::default(), &config);
        assert_eq!(results.method, "BATHYMETRY");

        let results = attach_run_identifier(Results::new("FD"), &config);
        assert_eq!(results.method, "FD");
    }
}
