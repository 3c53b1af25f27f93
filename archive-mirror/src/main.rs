//! Archive Mirror - Main entry point
//!
//! Mirrors backup archive sets to the configured FTP store.

use anyhow::Context;
use archive_mirror::config::Config;
use archive_mirror::remote::ftp::FtpConnector;
use archive_mirror::signal::RunEnd;
use archive_mirror::status::StatusReport;
use archive_mirror::{signal, utils, ExitStatus, Runner};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mirror archive sets and apply retention (default)
    Run,

    /// Show recent log output and the local archive inventory
    Status,

    /// Delete old log files, keeping the newest ones
    PruneLogs {
        /// Number of log files to keep
        #[arg(short, long, default_value_t = 10)]
        keep: usize,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            return ExitCode::from(ExitStatus::Fatal.code());
        }
    };

    let result = match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config, args.log_level),
        Command::Status => status(&config),
        Command::PruneLogs { keep } => prune_logs(&config, keep),
    };

    match result {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            eprintln!("Fatal error: {:#}", e);
            ExitCode::from(ExitStatus::Fatal.code())
        }
    }
}

fn run(config: Config, log_level: Option<String>) -> anyhow::Result<ExitStatus> {
    let level = log_level.unwrap_or_else(|| config.log.level.clone());
    utils::logger::init(&level, &config.log)?;

    tracing::info!("{}", "=".repeat(70));
    tracing::info!("Starting archive-mirror v{}", env!("CARGO_PKG_VERSION"));
    if let Some(file) = &config.log.file {
        tracing::info!("Log file: {}", file.display());
    }
    tracing::info!("Log level: {}", level);

    let connector = Arc::new(FtpConnector::new(&config.remote));
    let runner = Runner::new(config, connector);

    let end = signal::run_interruptible(runner.run(), signal::wait_for_interrupt())
        .context("starting async runtime")?;

    let status = match end {
        RunEnd::Finished(Ok(report)) => report.exit_status(),
        RunEnd::Finished(Err(e)) => {
            tracing::error!("FATAL ERROR: Backup process failed: {:#}", e);
            ExitStatus::Fatal
        }
        RunEnd::Interrupted(interrupt) => {
            tracing::warn!("Run stopped by {}", interrupt.signal_name());
            ExitStatus::Interrupted
        }
    };

    Ok(status)
}

fn status(config: &Config) -> anyhow::Result<ExitStatus> {
    let report = StatusReport::collect(config).context("collecting status")?;
    println!("{}", report);
    Ok(ExitStatus::Success)
}

fn prune_logs(config: &Config, keep: usize) -> anyhow::Result<ExitStatus> {
    let dir = config.log.log_dir();
    if !dir.is_dir() {
        println!("Log directory not found: {}", dir.display());
        return Ok(ExitStatus::Success);
    }

    let summary = utils::logger::prune_log_files(&dir, keep)
        .with_context(|| format!("pruning logs in {}", dir.display()))?;
    for path in &summary.removed {
        println!("Removed: {}", path.display());
    }
    println!("Kept {} log files", summary.kept);
    Ok(ExitStatus::Success)
}
