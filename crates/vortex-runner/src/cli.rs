//! Command-line surface of the `vortex` binary

use crate::engine::MockEngine;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;
use vortex_dispatch::adapters::{
    FsPathBuilder, JsonPlanRenderer, JsonlLedger, ManifestFinalizer, TracingMonitor,
};
use vortex_dispatch::normalize::alias_table;
use vortex_dispatch::{
    CanonicalMethod, DispatchOutcome, DispatchResult, Dispatcher, Preset, RunRequest, Settings,
};

/// Vortex simulation dispatcher
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch a run request file through the mock engine
    Run(RunArgs),
    /// List canonical methods, accepted aliases and implementation status
    Methods,
    /// List presets and the values they set
    Presets,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to a TOML run request
    pub request: PathBuf,

    /// Apply a named preset before the explicit overrides below
    #[arg(long)]
    pub preset: Option<String>,

    /// Method name (overrides the request file and preset)
    #[arg(long)]
    pub method: Option<String>,

    /// Mode name (overrides the request file)
    #[arg(long)]
    pub mode: Option<String>,

    /// Output root directory (overrides VORTEX_OUTPUT_ROOT)
    #[arg(long)]
    pub output_root: Option<PathBuf>,

    /// Skip the master ledger append
    #[arg(long, default_value_t = false)]
    pub no_ledger: bool,
}

impl RunArgs {
    /// Load the request file, then overlay environment and flags.
    pub fn load_request(&self) -> DispatchResult<RunRequest> {
        let mut request = RunRequest::load(&self.request)?;
        request.settings.apply_env();
        self.apply_overrides(&mut request)?;
        Ok(request)
    }

    /// Precedence, lowest first: request file, preset, flags.
    pub fn apply_overrides(&self, request: &mut RunRequest) -> DispatchResult<()> {
        if let Some(name) = &self.preset {
            let preset = Preset::from_name(name)?;
            preset.apply(&mut request.run, &mut request.parameters);
            info!(preset = %preset, "Applied preset");
        }
        if let Some(method) = &self.method {
            request.run.method = Some(method.clone());
        }
        if let Some(mode) = &self.mode {
            request.run.mode = Some(mode.clone());
        }
        if let Some(root) = &self.output_root {
            request.settings.output_root = root.clone();
        }
        if self.no_ledger {
            request.settings.append_to_master = false;
        }
        Ok(())
    }
}

/// Dispatcher wired with the mock engine and the filesystem adapters.
pub fn build_dispatcher(settings: &Settings) -> Dispatcher {
    let root = &settings.output_root;
    CanonicalMethod::ALL
        .into_iter()
        .filter(|method| method.is_implemented())
        .fold(Dispatcher::new(FsPathBuilder::new(root)), |dispatcher, method| {
            dispatcher.with_solver(method, MockEngine::new(method))
        })
        .with_finalizer(ManifestFinalizer::new())
        .with_monitor(TracingMonitor)
        .with_ledger(JsonlLedger::new(settings.ledger_path()))
        .with_renderer(JsonPlanRenderer)
}

pub fn run(mut request: RunRequest) -> DispatchResult<DispatchOutcome> {
    let dispatcher = build_dispatcher(&request.settings);
    dispatcher.dispatch(&mut request.run, &request.parameters, &request.settings)
}

pub fn methods_report() -> Value {
    let aliases = alias_table();
    CanonicalMethod::ALL
        .into_iter()
        .map(|method| {
            json!({
                "method": method.as_str(),
                "aliases": aliases.get(method.as_str()),
                "implemented": method.is_implemented(),
                "modes": method
                    .supported_modes()
                    .iter()
                    .map(|mode| mode.as_str())
                    .collect::<Vec<_>>(),
            })
        })
        .collect()
}

pub fn presets_report() -> Value {
    Preset::ALL
        .into_iter()
        .map(|preset| json!({ "name": preset.name(), "overrides": preset.overrides() }))
        .collect()
}
