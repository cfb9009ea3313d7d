//! Ad-hoc scoring

use clap::Args;
use colored::Colorize;
use sensorwatch_anomaly::AnomalyDetector;
use serde::Serialize;

use crate::error::CliResult;
use crate::output::print_structured;
use crate::Context;

/// Score arguments
#[derive(Args)]
pub struct ScoreArgs {
    /// Values of the scored feature
    #[arg(required = true, allow_negative_numbers = true)]
    values: Vec<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRow {
    value: f64,
    score: f64,
    is_normal: bool,
    threshold: f64,
}

/// Execute score command
pub(crate) fn execute(args: ScoreArgs, ctx: &Context) -> CliResult<()> {
    let detector = AnomalyDetector::open(&ctx.config.detector.param_path)?;

    let rows = args
        .values
        .iter()
        .map(|&value| {
            let verdict = detector.evaluate(value)?;
            Ok(ScoreRow {
                value,
                score: verdict.score,
                is_normal: verdict.is_normal,
                threshold: verdict.threshold,
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    if !print_structured(&rows, ctx.format)? {
        println!(
            "{:<14} {:>14} {:>12}  {}",
            "VALUE".bold(),
            "SCORE".bold(),
            "THRESHOLD".bold(),
            "STATE".bold()
        );
        for row in &rows {
            let state = if row.is_normal {
                "normal".green()
            } else {
                "anomaly".red().bold()
            };
            println!(
                "{:<14} {:>14.3} {:>12.3}  {}",
                row.value, row.score, row.threshold, state
            );
        }
    }
    Ok(())
}
