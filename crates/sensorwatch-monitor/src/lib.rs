//! # sensorwatch-monitor
//!
//! Ingestion side of sensorwatch: turns the sensor's serial line stream
//! into scored, rendered readings.
//!
//! ## Architecture
//!
//! ```text
//!   ┌────────────────┐  next_line   ┌──────────────┐
//!   │ ReadingSource  │─────────────►│   Monitor    │◄── ShutdownSignal
//!   │ stdin / file / │              │  parse line  │
//!   │ simulated      │              │  push window │
//!   └───────┬────────┘              └──────┬───────┘
//!           │ raw lines                    │ evaluate(feature)
//!           ▼                              ▼
//!      ┌─────────┐                ┌──────────────────┐
//!      │ RawLog  │                │ AnomalyDetector  │
//!      └─────────┘                └────────┬─────────┘
//!                                          │ Frame
//!                                          ▼
//!                                 ┌──────────────────┐
//!                                 │  ChartBackend    │ ← console / jsonlines
//!                                 └──────────────────┘
//! ```
//!
//! Configuration is one [`SensorwatchConfig`] built at startup and passed
//! down; nothing reads settings globally.

#![deny(unsafe_code)]

pub mod backend;
pub mod calibration;
pub mod config;
pub mod error;
pub mod monitor;
pub mod reading;
pub mod source;
pub mod window;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use backend::{backend_for, ChartBackend, ConsoleBackend, Frame, JsonLinesBackend};
pub use calibration::{load_dataset, parse_dataset};
pub use config::{
    DetectorConfig, LoggingConfig, MonitoringConfig, PlotType, SensorwatchConfig, SourceConfig,
    SourceKind,
};
pub use error::{MonitorError, MonitorResult};
pub use monitor::{Monitor, MonitorSummary, Shutdown, ShutdownSignal, ShutdownTrigger};
pub use reading::Reading;
pub use source::{build_source, LineSource, RawLog, ReadingSource, SimulatedSource};
pub use window::{SeriesSummary, SlidingWindow};
