//! Sensorwatch CLI - command-line interface for the humidity anomaly monitor
//!
//! This CLI gives operators a terminal interface to:
//! - Fit detector parameters from a calibration capture
//! - Score individual readings against the fitted parameters
//! - Inspect the persisted parameter document
//! - Run the live monitoring loop over a serial capture, stdin or simulated data

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sensorwatch_monitor::SensorwatchConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;

use commands::{fit, monitor, score, show};
pub use error::{CliError, CliResult};
pub use output::OutputFormat;

/// Sensorwatch CLI application
#[derive(Parser)]
#[command(name = "sensorwatch")]
#[command(about = "Sensorwatch - temperature/humidity anomaly monitor", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long, env = "SENSORWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Parameter document path (overrides detector.param_path)
    #[arg(short, long, global = true)]
    params: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Fit detector parameters from a calibration dataset
    Fit(fit::FitArgs),

    /// Score readings against the fitted parameters
    Score(score::ScoreArgs),

    /// Show the persisted parameters
    Show,

    /// Run the monitoring loop
    Monitor(monitor::MonitorArgs),
}

/// Shared state handed to every command.
pub(crate) struct Context {
    pub config: SensorwatchConfig,
    pub format: OutputFormat,
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    let mut config = SensorwatchConfig::load(cli.config.as_deref())?;
    if let Some(params) = cli.params {
        config.detector.param_path = params;
    }

    init_tracing(&config, cli.verbose, cli.log_json);

    let ctx = Context {
        config,
        format: cli.output,
    };

    match cli.command {
        Commands::Fit(args) => fit::execute(args, &ctx),
        Commands::Score(args) => score::execute(args, &ctx),
        Commands::Show => show::execute(&ctx),
        Commands::Monitor(args) => monitor::execute(args, ctx).await,
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(config: &SensorwatchConfig, verbose: bool, json: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    // A subscriber may already be set when embedded; keep it.
    if json || config.logging.json {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init();
    }
}
