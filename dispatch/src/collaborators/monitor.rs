//! Progress monitoring
//!
//! A monitor session is an explicit [`MonitorContext`] value with the
//! lifecycle `start -> update* -> stop`. Nothing is kept in global state, so
//! nested or back-to-back sessions cannot interfere.

use crate::config::Settings;
use crate::request::RunConfig;
use crate::results::RunStatus;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// One monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    pub session_id: Uuid,
    /// `METHOD/Mode` label of the monitored run
    pub label: String,
    pub run_id: Option<String>,
    pub enabled: bool,
    started: Instant,
    updates: usize,
}

impl MonitorContext {
    pub fn new(config: &RunConfig, settings: &Settings) -> Self {
        let label = format!(
            "{}/{}",
            config.method.as_deref().unwrap_or("?"),
            config.mode.as_deref().unwrap_or("?")
        );
        Self {
            session_id: Uuid::new_v4(),
            label,
            run_id: config.run_id.clone().or_else(|| config.study_id.clone()),
            enabled: settings.monitoring.enabled,
            started: Instant::now(),
            updates: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Count one progress report against this session.
    pub fn record_update(&mut self) {
        self.updates += 1;
    }
}

/// Progress of a multi-step run such as a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorProgress {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl MonitorProgress {
    pub fn new(completed: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            message: message.into(),
        }
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Closing report of a monitor session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl RunSummary {
    pub fn completed(total_time: f64) -> Self {
        Self {
            status: RunStatus::Completed,
            total_time,
            error_code: None,
        }
    }

    pub fn failed(total_time: f64, error_code: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            total_time,
            error_code: Some(error_code.into()),
        }
    }
}

/// Observes runs. Implementations must not fail or panic; a broken monitor
/// is logged and ignored by the implementation itself.
pub trait Monitor {
    fn start(&self, config: &RunConfig, settings: &Settings) -> MonitorContext;

    fn update(&self, ctx: &mut MonitorContext, progress: &MonitorProgress);

    fn stop(&self, ctx: MonitorContext, summary: &RunSummary);
}

/// Monitor that only tracks the session value.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {
    fn start(&self, config: &RunConfig, settings: &Settings) -> MonitorContext {
        MonitorContext::new(config, settings)
    }

    fn update(&self, ctx: &mut MonitorContext, _progress: &MonitorProgress) {
        ctx.record_update();
    }

    fn stop(&self, _ctx: MonitorContext, _summary: &RunSummary) {}
}
