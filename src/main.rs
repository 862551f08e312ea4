//! Two-phase component invocation codemod.
//!
//! Usage:
//!   `codemod instrument <paths..>`
//!   `codemod rewrite --telemetry <file> [paths..]`
//!   `codemod strip <paths..>`

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use codemod_native::{
    instrument_files, rewrite_files, rewrite_selected, strip_files, CodemodConfig, RunReport,
    TelemetryAggregate,
};

#[derive(Parser, Debug)]
#[command(name = "codemod")]
#[command(about = "Instrument templates for component detection and rewrite confirmed invocations to tag form")]
struct Args {
    /// JSON config file (defaults to ./codemod.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root that template identities and the helper path are relative to
    #[arg(long = "project-root", global = true)]
    project_root: Option<PathBuf>,

    /// Write files back even when nothing changed
    #[arg(long = "write-unchanged", global = true)]
    write_unchanged: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wrap ambiguous invocations in runtime probes and write the probe helper
    Instrument {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Rewrite invocations confirmed by telemetry into tag form
    Rewrite {
        /// Telemetry JSON: a datalet object or an array of datalets
        #[arg(long)]
        telemetry: PathBuf,
        /// Only these templates (default: every template named by the telemetry)
        paths: Vec<PathBuf>,
    },
    /// Remove probe conditionals
    Strip {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let args = Args::parse();

    let mut config = match CodemodConfig::discover(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(root) = args.project_root {
        config.project_root = root;
    }
    if args.write_unchanged {
        config.write_unchanged = true;
    }

    let report = match args.command {
        Command::Instrument { paths } => instrument_files(&paths, &config),
        Command::Rewrite { telemetry, paths } => {
            let aggregate = match TelemetryAggregate::load(&telemetry) {
                Ok(aggregate) => aggregate,
                Err(e) => {
                    error!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            if paths.is_empty() {
                rewrite_files(&aggregate, &config)
            } else {
                rewrite_selected(&paths, &aggregate, &config)
            }
        }
        Command::Strip { paths } => strip_files(&paths, &config),
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to encode run report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&report);
    }

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_summary(report: &RunReport) {
    if let Some(stub) = &report.stub {
        info!("Runtime stub {:?}: {}", stub.status, stub.path.display());
    }
    for file in &report.files {
        info!("{:?} {} ({} changes)", file.status, file.path.display(), file.changes);
    }
    info!(
        "{} written, {} unchanged, {} skipped, {} failed",
        report.written(),
        report.unchanged(),
        report.skipped(),
        report.failed()
    );
}
