//! Offline parameter fitting

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;
use sensorwatch_anomaly::{AnomalyDetector, FitOptions};
use sensorwatch_monitor::load_dataset;
use serde_json::Value;

use crate::commands::show::print_parameters_table;
use crate::error::CliResult;
use crate::output::print_structured;
use crate::Context;

/// Fit arguments
#[derive(Args)]
pub struct FitArgs {
    /// Calibration dataset: one number or one transport line per line
    #[arg(short, long)]
    input: PathBuf,

    /// Interval confidence (default: detector.confidence)
    #[arg(long)]
    confidence: Option<f64>,

    /// Degrees of freedom (default: detector.degrees_of_freedom)
    #[arg(long)]
    df: Option<f64>,

    /// Field taken from transport lines (default: monitoring.feature)
    #[arg(long)]
    feature: Option<String>,

    /// Extra field stored with the parameters; VALUE is parsed as JSON, else kept as text
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, Value)>,
}

/// Execute fit command
pub(crate) fn execute(args: FitArgs, ctx: &Context) -> CliResult<()> {
    let feature = args
        .feature
        .as_deref()
        .unwrap_or(&ctx.config.monitoring.feature);
    let dataset = load_dataset(&args.input, feature)?;

    let mut options = FitOptions::default()
        .with_confidence(args.confidence.unwrap_or(ctx.config.detector.confidence))
        .with_degrees_of_freedom(args.df.unwrap_or(ctx.config.detector.degrees_of_freedom));
    for (key, value) in args.set {
        options = options.with_extra(key, value);
    }

    let path = ctx.config.detector.param_path.as_path();
    let detector = AnomalyDetector::open(path)?;
    let params = detector.fit(&dataset, options)?;

    if !print_structured(&*params, ctx.format)? {
        println!(
            "{} {} samples from {}",
            "Fitted".green().bold(),
            dataset.len(),
            args.input.display()
        );
        println!();
        print_parameters_table(path, &params);
    }
    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
