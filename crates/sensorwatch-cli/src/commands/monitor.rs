//! Live monitoring

use std::io::IsTerminal;
use std::sync::Arc;

use clap::Args;
use sensorwatch_anomaly::AnomalyDetector;
use sensorwatch_monitor::{
    backend_for, build_source, Monitor, SensorwatchConfig, Shutdown, SourceKind,
};
use tracing::{info, warn};

use crate::error::CliResult;
use crate::output::print_structured;
use crate::Context;

/// Monitor arguments
#[derive(Args)]
pub struct MonitorArgs {
    /// Use simulated readings instead of the configured source
    #[arg(long)]
    simulate: bool,

    /// Stop after this many simulated readings
    #[arg(long)]
    max_readings: Option<u64>,

    /// Debug profile: fast simulated readings and a short window
    #[arg(long)]
    debug: bool,
}

/// Execute monitor command
pub(crate) async fn execute(args: MonitorArgs, ctx: Context) -> CliResult<()> {
    let mut config = ctx.config;
    if args.debug {
        let profile = SensorwatchConfig::debug();
        config.source.kind = profile.source.kind;
        config.source.interval_ms = profile.source.interval_ms;
        config.monitoring.data_length = profile.monitoring.data_length;
    }
    if args.simulate {
        config.source.kind = SourceKind::Simulated;
    }
    if args.max_readings.is_some() {
        config.source.max_readings = args.max_readings;
    }
    config.validate()?;

    let detector = Arc::new(AnomalyDetector::open(&config.detector.param_path)?);
    if !detector.is_fitted() {
        warn!(
            path = %config.detector.param_path.display(),
            "parameters are not fitted; run `sensorwatch fit` first"
        );
    }

    let source = build_source(&config.source).await?;
    let color = std::io::stdout().is_terminal();
    let backend = backend_for(config.monitoring.plot_type, std::io::stdout(), color);
    let mut monitor = Monitor::new(detector, source, backend, &config.monitoring);

    let (trigger, signal) = Shutdown::new();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    let summary = monitor.run(signal).await?;
    print_structured(&summary, ctx.format)?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping monitor");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping monitor");
        }
    }
}
