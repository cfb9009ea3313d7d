//! # sensorwatch-anomaly
//!
//! Anomaly scoring core for the sensorwatch temperature/humidity monitor.
//!
//! Parameters are fitted offline from a calibration dataset, persisted as a
//! small JSON document, and reloaded at startup. Online, each reading is
//! scored and compared against a fixed threshold derived from the
//! chi-squared distribution.
//!
//! ## Architecture
//!
//! ```text
//!   calibration dataset
//!         │ fit(dataset, FitOptions)
//!         ▼
//!   ┌──────────────────┐   save    ┌──────────────────┐
//!   │ AnomalyDetector  │──────────►│ ParameterStore   │ ← JsonFileStore
//!   │  Arc<Params>     │◄──────────│  (one record)    │   InMemoryStore
//!   └────────┬─────────┘   load    └──────────────────┘
//!            │ score(value) / is_normal(score) / evaluate(value)
//!            ▼
//!        Verdict { score, is_normal, threshold }
//! ```
//!
//! ## Scoring
//!
//! The score is `value - mean² / variance`, kept exactly as the deployed
//! tooling computes it. It is not the textbook squared standardized
//! distance `(value - mean)² / variance`; changing it would shift every
//! verdict against existing thresholds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sensorwatch_anomaly::{AnomalyDetector, FitOptions};
//!
//! let detector = AnomalyDetector::open("param_hotelling_t2.json").unwrap();
//! let calibration: Vec<f64> = (0..100).map(f64::from).collect();
//! detector.fit(&calibration, FitOptions::default()).unwrap();
//!
//! let verdict = detector.evaluate(60.0).unwrap();
//! println!("score {:.3} normal {}", verdict.score, verdict.is_normal);
//! ```

#![deny(unsafe_code)]

pub mod detector;
pub mod error;
pub mod params;
pub mod store;
pub mod threshold;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use detector::{AnomalyDetector, FitOptions, Verdict};
pub use error::{AnomalyError, AnomalyResult};
pub use params::FittedParameters;
pub use store::{InMemoryStore, JsonFileStore, ParameterStore};
pub use threshold::{chi_squared_interval, upper_critical_value};

/// Default probability mass of the chi-squared interval.
pub const DEFAULT_CONFIDENCE: f64 = 0.99;

/// Default chi-squared degrees of freedom.
pub const DEFAULT_DEGREES_OF_FREEDOM: f64 = 1.0;

/// Default model label written into fitted records.
pub const DEFAULT_LABEL: &str = "Hotelling T-squared distribution";

/// `chrono` format of the `fittedAt` field (`YYYY/MM/DD-HH:MM:SS.ffffff`).
pub const FITTED_AT_FORMAT: &str = "%Y/%m/%d-%H:%M:%S%.6f";
