use crate::collaborators::{Monitor, MonitorContext, MonitorProgress, RunSummary};
use crate::config::Settings;
use crate::request::RunConfig;
use crate::results::RunStatus;
use tracing::{info, warn};

/// Reports monitor sessions through `tracing`. Silent when monitoring is
/// disabled in the settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn start(&self, config: &RunConfig, settings: &Settings) -> MonitorContext {
        let ctx = MonitorContext::new(config, settings);
        if ctx.enabled {
            info!(
                session = %ctx.session_id,
                run = %ctx.label,
                run_id = ?ctx.run_id,
                "Monitoring started"
            );
        }
        ctx
    }

    fn update(&self, ctx: &mut MonitorContext, progress: &MonitorProgress) {
        ctx.record_update();
        if ctx.enabled {
            info!(
                session = %ctx.session_id,
                completed = progress.completed,
                total = progress.total,
                percent = %format!("{:.0}", progress.fraction() * 100.0),
                "{}",
                progress.message
            );
        }
    }

    fn stop(&self, ctx: MonitorContext, summary: &RunSummary) {
        if !ctx.enabled {
            return;
        }
        match summary.status {
            RunStatus::Completed => info!(
                session = %ctx.session_id,
                run = %ctx.label,
                updates = ctx.updates(),
                total_time = summary.total_time,
                "Monitoring stopped"
            ),
            RunStatus::Failed => warn!(
                session = %ctx.session_id,
                run = %ctx.label,
                updates = ctx.updates(),
                total_time = summary.total_time,
                code = ?summary.error_code,
                "Monitored run failed"
            ),
        }
    }
}
