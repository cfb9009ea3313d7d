//! Reading sources: where transport lines come from.
//!
//! The serial link is consumed as a plain line stream (a tty device path,
//! a capture file, or stdin). `SimulatedSource` stands in for the device
//! during development.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, info};

use crate::config::{SourceConfig, SourceKind};
use crate::error::{MonitorError, MonitorResult};
use crate::reading::READING_TIMESTAMP_FORMAT;

/// Produces transport lines one at a time.
///
/// `next_line` must be cancel-safe: the monitor races it against the
/// shutdown signal.
#[async_trait]
pub trait ReadingSource: Send {
    /// Next line without its terminator, or `None` at end of stream.
    async fn next_line(&mut self) -> MonitorResult<Option<String>>;
}

// ── Line source ─────────────────────────────────────────────────────────

/// Lines from any buffered async reader.
///
/// With a raw log attached, each line is held in `pending` until its
/// append completes, so a `next_line` dropped mid-append hands the same
/// line out on the next call instead of losing it.
pub struct LineSource<R> {
    lines: Lines<R>,
    raw_log: Option<RawLog>,
    pending: Option<String>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            raw_log: None,
            pending: None,
        }
    }

    /// Append every received line to `log`.
    pub fn with_raw_log(mut self, log: RawLog) -> Self {
        self.raw_log = Some(log);
        self
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ReadingSource for LineSource<R> {
    async fn next_line(&mut self) -> MonitorResult<Option<String>> {
        if self.pending.is_none() {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.pending = Some(line.trim_end_matches('\r').to_string());
        }
        if let (Some(log), Some(line)) = (self.raw_log.as_mut(), self.pending.as_deref()) {
            log.append(line).await?;
        }
        Ok(self.pending.take())
    }
}

// ── Raw line log ────────────────────────────────────────────────────────

/// Append-only log of raw transport lines.
pub struct RawLog {
    path: PathBuf,
    file: File,
}

impl RawLog {
    /// Resolve a configured log path; `"auto"` becomes `log/<timestamp>.log`.
    pub fn resolve_path(configured: &str) -> PathBuf {
        if configured == "auto" {
            PathBuf::from("log").join(format!("{}.log", Local::now().format("%Y%m%d%H%M%S%6f")))
        } else {
            PathBuf::from(configured)
        }
    }

    /// Open (or create) the log for appending, creating its directory.
    pub async fn open(path: impl Into<PathBuf>) -> MonitorResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(path = %path.display(), "logging raw lines");
        Ok(Self { path, file })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line.
    ///
    /// Dropping the future mid-write can leave a partial line in the file;
    /// a retry writes the whole line again after it.
    pub async fn append(&mut self, line: &str) -> MonitorResult<()> {
        self.file.write_all(format!("{}\n", line).as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }
}

// ── Simulated source ────────────────────────────────────────────────────

/// Probability that a simulated sample is taken next to the humidifier.
const SPIKE_PROBABILITY: f64 = 0.05;

/// Synthesizes firmware-format lines.
///
/// Temperature and humidity wander slowly around room conditions; now and
/// then a humidity spike imitates holding the sensor over a humidifier.
pub struct SimulatedSource {
    rng: StdRng,
    interval: Duration,
    remaining: Option<u64>,
    emitted: u64,
    started: Instant,
    temperature: f64,
    humidity: f64,
}

impl SimulatedSource {
    pub fn new(interval: Duration, max_readings: Option<u64>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            interval,
            remaining: max_readings,
            emitted: 0,
            started: Instant::now(),
            temperature: 24.0,
            humidity: 40.0,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            Duration::from_millis(config.interval_ms),
            config.max_readings,
            config.seed,
        )
    }

    fn next_sample(&mut self) -> String {
        self.temperature = (self.temperature + self.rng.gen_range(-0.05..0.05)).clamp(15.0, 35.0);
        self.humidity = (self.humidity + self.rng.gen_range(-0.2..0.2)).clamp(20.0, 70.0);

        let humidity = if self.rng.gen_bool(SPIKE_PROBABILITY) {
            self.humidity + self.rng.gen_range(20.0..40.0)
        } else {
            self.humidity
        };

        format!(
            "TimeStamp: {}, ElapsedTime[s]: {:.3}, Temperature[degC]: {:.3}, Humidity[%]: {:.3}",
            Local::now().format(READING_TIMESTAMP_FORMAT),
            self.started.elapsed().as_secs_f64(),
            self.temperature,
            humidity.min(100.0)
        )
    }
}

#[async_trait]
impl ReadingSource for SimulatedSource {
    async fn next_line(&mut self) -> MonitorResult<Option<String>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        if self.emitted > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.emitted += 1;
        Ok(Some(self.next_sample()))
    }
}

// ── Factory ─────────────────────────────────────────────────────────────

/// Build the configured source.
pub async fn build_source(config: &SourceConfig) -> MonitorResult<Box<dyn ReadingSource>> {
    let raw_log = match config.log_path.as_deref() {
        Some(configured) => Some(RawLog::open(RawLog::resolve_path(configured)).await?),
        None => None,
    };

    let source: Box<dyn ReadingSource> = match config.kind {
        SourceKind::Stdin => {
            debug!("reading transport lines from stdin");
            let source = LineSource::new(BufReader::new(tokio::io::stdin()));
            match raw_log {
                Some(log) => Box::new(source.with_raw_log(log)),
                None => Box::new(source),
            }
        }
        SourceKind::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                MonitorError::Config("source.path is required for file sources".into())
            })?;
            debug!(path = %path.display(), "reading transport lines from file");
            let source = LineSource::new(BufReader::new(File::open(path).await?));
            match raw_log {
                Some(log) => Box::new(source.with_raw_log(log)),
                None => Box::new(source),
            }
        }
        SourceKind::Simulated => {
            debug!(interval_ms = config.interval_ms, "simulating readings");
            Box::new(SimulatedSource::from_config(config))
        }
    };
    Ok(source)
}
