use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use csv_sql_exporter::{
    config::{AppConfig, resolve_config_path},
    export::run_export,
    logging,
};

const TOOL_NAME: &str = "CSV SQL Exporter";

/// Export a SQL table, view or stored procedure to a CSV file.
#[derive(Debug, Parser)]
#[command(name = "csv-sql-exporter", version, about)]
struct Cli {
    /// Configuration file, relative to the executable's folder.
    /// Defaults to `appsettings.json`.
    config: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long)]
    no_log_file: bool,

    /// Do not print log records on screen
    #[arg(long)]
    quiet: bool,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    info!("Using Config File {}", config_path.display());

    let config = AppConfig::from_path(&config_path)
        .with_context(|| format!("Unable to load {}", config_path.display()))?;

    let outcome = run_export(&config)?;
    info!(
        "Export complete: {}{}",
        outcome.output_path.display(),
        if outcome.uploaded { " (uploaded)" } else { "" }
    );

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init("csv-sql-exporter", !cli.no_log_file, !cli.quiet) {
        eprintln!("Unable to set up logging: {}", err);
        return ExitCode::FAILURE;
    }

    info!("{}", TOOL_NAME);
    info!("Export SQL Table or View to CSV File");
    info!("=========================================");
    info!("Version {}", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
