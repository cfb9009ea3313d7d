//! Parameter inspection

use std::path::Path;

use colored::Colorize;
use sensorwatch_anomaly::{AnomalyDetector, FittedParameters};
use serde::Serialize;

use crate::error::CliResult;
use crate::output::{or_dash, print_structured};
use crate::Context;

#[derive(Serialize)]
struct ShowReport<'a> {
    path: &'a Path,
    fitted: bool,
    parameters: &'a FittedParameters,
}

/// Execute show command
pub(crate) fn execute(ctx: &Context) -> CliResult<()> {
    let path = ctx.config.detector.param_path.as_path();
    let detector = AnomalyDetector::open(path)?;
    let params = detector.parameters();

    let report = ShowReport {
        path,
        fitted: params.is_fitted(),
        parameters: &params,
    };
    if !print_structured(&report, ctx.format)? {
        print_parameters_table(path, &params);
    }
    Ok(())
}

pub(crate) fn print_parameters_table(path: &Path, params: &FittedParameters) {
    println!("{}", "Detector Parameters".bold().cyan());
    println!("{}", "=".repeat(50));
    println!("  {:<20} {}", "Document:", path.display());
    println!(
        "  {:<20} {}",
        "Fitted:",
        if params.is_fitted() {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    println!("  {:<20} {}", "Mean:", or_dash(params.mean));
    println!("  {:<20} {}", "Variance:", or_dash(params.variance));
    println!("  {:<20} {}", "Confidence:", or_dash(params.confidence));
    println!(
        "  {:<20} {}",
        "Degrees of freedom:",
        or_dash(params.degrees_of_freedom)
    );
    println!("  {:<20} {}", "Threshold:", or_dash(params.threshold));
    println!("  {:<20} {}", "Label:", or_dash(params.label.as_deref()));
    println!("  {:<20} {}", "Fitted at:", or_dash(params.fitted_at.as_deref()));

    if !params.extra.is_empty() {
        println!();
        println!("  {}", "Extra fields".bold());
        for (key, value) in &params.extra {
            println!("    {:<18} {}", key, value);
        }
    }
}
