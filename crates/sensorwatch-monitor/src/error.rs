use sensorwatch_anomaly::AnomalyError;
use thiserror::Error;

/// Errors from the ingestion side of the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Detector(#[from] AnomalyError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("line does not start with a TimeStamp field: {0:?}")]
    InvalidHeader(String),

    #[error("malformed reading {line:?}: {reason}")]
    MalformedReading { line: String, reason: String },

    #[error("reading has no field {0:?}")]
    MissingFeature(String),
}

impl From<config::ConfigError> for MonitorError {
    fn from(e: config::ConfigError) -> Self {
        MonitorError::Config(e.to_string())
    }
}

/// Convenience type alias for monitor results.
pub type MonitorResult<T> = Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_errors_pass_through() {
        let e: MonitorError = AnomalyError::NotFitted("mean").into();
        assert!(matches!(e, MonitorError::Detector(AnomalyError::NotFitted(_))));
        assert!(e.to_string().contains("mean"));
    }

    #[test]
    fn malformed_reading_display() {
        let e = MonitorError::MalformedReading {
            line: "TimeStamp: x, Humidity[%]: wet".into(),
            reason: "Humidity[%] is not a number".into(),
        };
        assert!(e.to_string().contains("not a number"));
    }
}
