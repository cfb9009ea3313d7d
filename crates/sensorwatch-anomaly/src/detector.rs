//! The anomaly detector: offline fit, online score and verdict.
//!
//! The live record is held as an `Arc<FittedParameters>` behind a lock and
//! is never mutated in place. `fit` builds the replacement off to the side,
//! persists it, and only then swaps the pointer, so a concurrent reader sees
//! either the old or the new parameter set in full.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{AnomalyError, AnomalyResult};
use crate::params::FittedParameters;
use crate::store::{JsonFileStore, ParameterStore};
use crate::threshold::{upper_critical_value, validate_confidence, validate_degrees_of_freedom};
use crate::{DEFAULT_CONFIDENCE, DEFAULT_DEGREES_OF_FREEDOM};

/// Options for [`AnomalyDetector::fit`].
#[derive(Clone, Debug)]
pub struct FitOptions {
    /// Probability mass of the chi-squared interval (default: 0.99).
    pub confidence: f64,
    /// Chi-squared degrees of freedom (default: 1.0).
    pub degrees_of_freedom: f64,
    /// Fields merged over the computed record; may replace any of them.
    pub extra: Map<String, Value>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            degrees_of_freedom: DEFAULT_DEGREES_OF_FREEDOM,
            extra: Map::new(),
        }
    }
}

impl FitOptions {
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_degrees_of_freedom(mut self, degrees_of_freedom: f64) -> Self {
        self.degrees_of_freedom = degrees_of_freedom;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Score and verdict for one reading, taken from a single parameter snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub is_normal: bool,
    pub threshold: f64,
}

/// Anomaly detector bound to one parameter store.
pub struct AnomalyDetector<S: ParameterStore = JsonFileStore> {
    store: S,
    params: RwLock<Arc<FittedParameters>>,
    fit_lock: Mutex<()>,
}

impl AnomalyDetector<JsonFileStore> {
    /// Open a detector backed by the JSON document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> AnomalyResult<Self> {
        Self::new(JsonFileStore::new(path))
    }
}

impl<S: ParameterStore> AnomalyDetector<S> {
    /// Create a detector, loading any previously persisted parameters.
    ///
    /// A missing record yields an unfitted detector; a corrupt one is an
    /// error.
    pub fn new(store: S) -> AnomalyResult<Self> {
        let params = store.load()?;
        if params.is_fitted() {
            info!(
                mean = ?params.mean,
                variance = ?params.variance,
                threshold = ?params.threshold,
                "loaded fitted parameters"
            );
        }
        Ok(Self {
            store,
            params: RwLock::new(Arc::new(params)),
            fit_lock: Mutex::new(()),
        })
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot of the current parameters.
    pub fn parameters(&self) -> Arc<FittedParameters> {
        self.params.read().clone()
    }

    /// Whether mean, variance and threshold are all available.
    pub fn is_fitted(&self) -> bool {
        self.params.read().is_fitted()
    }

    /// Fit mean, population variance and threshold to `dataset`, persist the
    /// record, then make it live.
    ///
    /// On any error the live parameters are left as they were.
    pub fn fit(&self, dataset: &[f64], options: FitOptions) -> AnomalyResult<Arc<FittedParameters>> {
        if dataset.is_empty() {
            return Err(AnomalyError::InvalidInput("calibration dataset is empty".into()));
        }
        if let Some(bad) = dataset.iter().find(|v| !v.is_finite()) {
            return Err(AnomalyError::InvalidInput(format!(
                "calibration dataset contains non-finite value {}",
                bad
            )));
        }
        validate_confidence(options.confidence)?;
        validate_degrees_of_freedom(options.degrees_of_freedom)?;

        let (mean, variance) = mean_and_population_variance(dataset);
        let threshold = upper_critical_value(options.confidence, options.degrees_of_freedom)?;

        let record = FittedParameters::fitted(
            mean,
            variance,
            options.confidence,
            options.degrees_of_freedom,
            threshold,
        )
        .with_overrides(&options.extra)?;

        if record.variance == Some(0.0) {
            warn!(
                samples = dataset.len(),
                "calibration data has zero variance; scoring will be rejected"
            );
        }

        let _guard = self.fit_lock.lock();
        self.store.save(&record)?;

        let record = Arc::new(record);
        *self.params.write() = record.clone();

        info!(
            samples = dataset.len(),
            mean = ?record.mean,
            variance = ?record.variance,
            threshold = ?record.threshold,
            "parameters fitted"
        );
        Ok(record)
    }

    /// Anomaly score of one reading: `value - mean² / variance`.
    pub fn score(&self, value: f64) -> AnomalyResult<f64> {
        score_with(&self.parameters(), value)
    }

    /// `true` when `score` is at or below the threshold.
    pub fn is_normal(&self, score: f64) -> AnomalyResult<bool> {
        is_normal_with(&self.parameters(), score)
    }

    /// Score `value` and classify it against the same parameter snapshot.
    pub fn evaluate(&self, value: f64) -> AnomalyResult<Verdict> {
        let params = self.parameters();
        let score = score_with(&params, value)?;
        let threshold = params.threshold.ok_or(AnomalyError::NotFitted("threshold"))?;
        Ok(Verdict {
            score,
            is_normal: score <= threshold,
            threshold,
        })
    }
}

fn score_with(params: &FittedParameters, value: f64) -> AnomalyResult<f64> {
    let mean = params.mean.ok_or(AnomalyError::NotFitted("mean"))?;
    let variance = params.variance.ok_or(AnomalyError::NotFitted("variance"))?;
    if variance == 0.0 || !variance.is_finite() {
        return Err(AnomalyError::DegenerateParameters(format!(
            "variance is {}",
            variance
        )));
    }
    Ok(value - mean.powi(2) / variance)
}

fn is_normal_with(params: &FittedParameters, score: f64) -> AnomalyResult<bool> {
    let threshold = params.threshold.ok_or(AnomalyError::NotFitted("threshold"))?;
    Ok(score <= threshold)
}

fn mean_and_population_variance(dataset: &[f64]) -> (f64, f64) {
    let n = dataset.len() as f64;
    let mean = dataset.iter().sum::<f64>() / n;
    let variance = dataset.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}
