//! `vortex` - dispatch simulation run requests from the command line

use anyhow::Result;
use clap::Parser;
use vortex_dispatch::ErrorRecord;
use vortex_runner::cli::{self, Cli, Command};

fn init_tracing(default_filter: &str) {
    let fallback = default_filter.to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print the record as JSON and exit non-zero.
fn fail(record: &ErrorRecord) -> ! {
    println!("{}", record.to_json());
    std::process::exit(1);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let request = match args.load_request() {
                Ok(request) => request,
                Err(record) => {
                    init_tracing("info");
                    fail(&record)
                }
            };
            init_tracing(&request.settings.logging.filter);

            match cli::run(request) {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome.results)?),
                Err(record) => fail(&record),
            }
        }
        Command::Methods => {
            println!("{}", serde_json::to_string_pretty(&cli::methods_report())?);
        }
        Command::Presets => {
            println!("{}", serde_json::to_string_pretty(&cli::presets_report())?);
        }
    }

    Ok(())
}
