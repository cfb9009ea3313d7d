use thiserror::Error;

/// Errors from the anomaly scoring core.
#[derive(Debug, Error)]
pub enum AnomalyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("detector not fitted: {0} is not set")]
    NotFitted(&'static str),

    #[error("degenerate parameters: {0}")]
    DegenerateParameters(String),

    #[error("persistence error: {0}")]
    PersistenceError(String),
}

impl From<std::io::Error> for AnomalyError {
    fn from(e: std::io::Error) -> Self {
        AnomalyError::PersistenceError(e.to_string())
    }
}

/// Convenience type alias for anomaly results.
pub type AnomalyResult<T> = Result<T, AnomalyError>;
