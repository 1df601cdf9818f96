//! gqlprobe cli definition and entrypoint.
pub mod check;
pub mod list;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gqlprobe_core::config::ProbeConfig;
use tracing::debug;

use crate::log::{log_dir, setup_logging};

/// gqlprobe - run GraphQL query files against an API and check the responses.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML config file. Environment variables are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to gqlprobe.log.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every query file as a test case.
    Run {
        /// Only run cases whose name contains this text.
        #[arg(short, long)]
        filter: Option<String>,
        /// Write error artifacts under this directory.
        #[arg(long)]
        report_dir: Option<PathBuf>,
        /// Do not probe the endpoint before running the cases.
        #[arg(long)]
        skip_health_check: bool,
    },
    /// Probe the endpoint with a `{ __typename }` query.
    Check,
    /// List the collected cases without running them.
    List {
        /// Only list cases whose name contains this text.
        #[arg(short, long)]
        filter: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ProbeConfig> {
    let config = match path {
        Some(path) => ProbeConfig::from_file(path, |key| std::env::var(key).ok()),
        None => ProbeConfig::from_process_env(),
    };
    config.context("Failed to load configuration")
}

/// Runs the CLI. Returns whether every case passed or was skipped.
pub async fn run_app() -> Result<bool> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Commands::Run {
        report_dir: Some(dir),
        ..
    } = &cli.command
    {
        config.report_dir = Some(dir.clone());
    }

    if cli.verbose {
        let dir = log_dir(config.report_dir.as_deref())?;
        setup_logging(&dir).context("Failed to set up logging")?;
    }
    debug!(?config, "Loaded configuration");

    let mut stdout = std::io::stdout();
    match cli.command {
        Commands::Run {
            filter,
            skip_health_check,
            ..
        } => {
            let options = run::RunOptions {
                filter,
                health_check: !skip_health_check,
            };
            run::execute(&config, &options, &mut stdout).await
        }
        Commands::Check => check::execute(&config, &mut stdout).await,
        Commands::List { filter } => list::execute(&config, filter.as_deref(), &mut stdout),
    }
}
