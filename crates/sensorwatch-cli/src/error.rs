//! CLI error types

use sensorwatch_anomaly::AnomalyError;
use sensorwatch_monitor::MonitorError;
use thiserror::Error;

/// CLI error type
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Detector error: {0}")]
    Detector(#[from] AnomalyError),

    #[error("Monitor error: {0}")]
    Monitor(MonitorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<MonitorError> for CliError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Detector(e) => CliError::Detector(e),
            MonitorError::Config(msg) => CliError::Config(msg),
            other => CliError::Monitor(other),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
