//! CLI entry point for the regional transit feed report.
//!
//! Provides subcommands for producing the full per-region report set and for
//! checking which regions have all their input files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_region_report::config::ReportConfig;
use gtfs_region_report::pipeline::{Orchestrator, RegionOutcome};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_region_report")]
#[command(about = "Descriptive analytics over static transit feeds, one region at a time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce charts, maps and CSV reports for every configured region
    Report {
        /// JSON configuration file; built-in defaults when omitted
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the number of regions processed at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },
    /// List configured regions and any missing input files
    Check {
        /// JSON configuration file; built-in defaults when omitted
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/gtfs_region_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_region_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Report {
        config: None,
        concurrency: None,
    }) {
        Commands::Report {
            config,
            concurrency,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
                config.validate()?;
            }

            let orchestrator = Orchestrator::with_default_renderers(config);
            let report = orchestrator.run().await?;

            for outcome in &report.outcomes {
                match outcome {
                    RegionOutcome::Done(r) => info!(
                        region = %r.region,
                        peak_hour = ?r.kpis.peak_hour,
                        artifacts = r.artifacts.len(),
                        "Region report"
                    ),
                    RegionOutcome::Skipped { region, reason } => {
                        warn!(region = %region, reason = %reason, "Region skipped")
                    }
                }
            }
        }
        Commands::Check { config } => {
            let config = load_config(config.as_deref())?;
            let orchestrator = Orchestrator::with_default_renderers(config);

            info!(base_path = %orchestrator.config().base_path.display(), "Checking regions");
            let checks = orchestrator.check();
            for (region, missing) in &checks {
                if missing.is_empty() {
                    info!(region = %region, "Region ready");
                } else {
                    warn!(region = %region, missing = ?missing, "Region incomplete");
                }
            }

            let ready = checks.iter().filter(|(_, m)| m.is_empty()).count();
            info!(
                total = checks.len(),
                ready,
                incomplete = checks.len() - ready,
                "Check summary"
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ReportConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            ReportConfig::load(path)
        }
        None => Ok(ReportConfig::default()),
    }
}
