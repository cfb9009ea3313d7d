//! Configuration for the monitor.
//!
//! One `SensorwatchConfig` is built at process start and handed to each
//! component's constructor. Layers, lowest precedence first: built-in
//! defaults, an optional settings file (TOML, YAML or JSON by extension),
//! then `SENSORWATCH_*` environment variables with `__` between sections,
//! e.g. `SENSORWATCH_MONITORING__DATA_LENGTH=50`.

use std::path::{Path, PathBuf};

use sensorwatch_anomaly::threshold::{validate_confidence, validate_degrees_of_freedom};
use sensorwatch_anomaly::{DEFAULT_CONFIDENCE, DEFAULT_DEGREES_OF_FREEDOM};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SENSORWATCH";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorwatchConfig {
    /// Detector configuration
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Reading source configuration
    #[serde(default)]
    pub source: SourceConfig,

    /// Monitoring loop configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Parameter document path
    #[serde(default = "default_param_path")]
    pub param_path: PathBuf,

    /// Confidence used by `fit` when none is given
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Degrees of freedom used by `fit` when none are given
    #[serde(default = "default_degrees_of_freedom")]
    pub degrees_of_freedom: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            param_path: default_param_path(),
            confidence: DEFAULT_CONFIDENCE,
            degrees_of_freedom: DEFAULT_DEGREES_OF_FREEDOM,
        }
    }
}

/// Where readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Transport lines on standard input
    #[default]
    Stdin,
    /// Transport lines from a file or character device
    File,
    /// Synthesized readings
    Simulated,
}

/// Reading source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind
    #[serde(default)]
    pub kind: SourceKind,

    /// Path for `file` sources (a log file or a tty device)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Raw line log; `"auto"` picks a timestamped file under `log/`
    #[serde(default)]
    pub log_path: Option<String>,

    /// Delay between simulated readings in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Stop a simulated source after this many readings
    #[serde(default)]
    pub max_readings: Option<u64>,

    /// Seed for the simulated source
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Stdin,
            path: None,
            log_path: None,
            interval_ms: default_interval_ms(),
            max_readings: None,
            seed: None,
        }
    }
}

/// Presentation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotType {
    /// Human-readable line per reading
    #[default]
    Console,
    /// One JSON object per reading, for dashboards
    JsonLines,
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Sliding window length (readings kept for charting)
    #[serde(default = "default_data_length")]
    pub data_length: usize,

    /// Presentation backend
    #[serde(default)]
    pub plot_type: PlotType,

    /// Reading field that is scored
    #[serde(default = "default_feature")]
    pub feature: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            data_length: default_data_length(),
            plot_type: PlotType::Console,
            feature: default_feature(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_param_path() -> PathBuf {
    PathBuf::from("param_hotelling_t2.json")
}

fn default_confidence() -> f64 {
    DEFAULT_CONFIDENCE
}

fn default_degrees_of_freedom() -> f64 {
    DEFAULT_DEGREES_OF_FREEDOM
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_data_length() -> usize {
    100
}

fn default_feature() -> String {
    "Humidity[%]".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SensorwatchConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// A file that is named explicitly must exist.
    pub fn load(path: Option<&Path>) -> MonitorResult<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SensorwatchConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: SensorwatchConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.monitoring.data_length == 0 {
            return Err(MonitorError::Config(
                "monitoring.data_length must be at least 1".into(),
            ));
        }
        if self.monitoring.feature.trim().is_empty() {
            return Err(MonitorError::Config("monitoring.feature is empty".into()));
        }
        validate_confidence(self.detector.confidence)
            .map_err(|e| MonitorError::Config(format!("detector.confidence: {}", e)))?;
        validate_degrees_of_freedom(self.detector.degrees_of_freedom)
            .map_err(|e| MonitorError::Config(format!("detector.degrees_of_freedom: {}", e)))?;
        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err(MonitorError::Config(
                "source.path is required for file sources".into(),
            ));
        }
        Ok(())
    }

    /// Settings for interactive debugging: simulated input, short window.
    pub fn debug() -> Self {
        let mut config = Self::default();
        config.source.kind = SourceKind::Simulated;
        config.source.interval_ms = 100;
        config.monitoring.data_length = 10;
        config
    }
}
