//! The ingestion loop: read, parse, window, score, render.

use std::sync::Arc;

use sensorwatch_anomaly::{AnomalyDetector, JsonFileStore, ParameterStore};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{ChartBackend, Frame};
use crate::config::MonitoringConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::reading::Reading;
use crate::source::ReadingSource;
use crate::window::SlidingWindow;

// ── Shutdown ────────────────────────────────────────────────────────────

/// Constructor for a connected trigger/signal pair.
pub struct Shutdown;

impl Shutdown {
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (ShutdownTrigger, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx: Arc::new(tx) }, ShutdownSignal { rx })
    }
}

/// Requests a graceful stop. Clones share the same channel.
#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a [`ShutdownTrigger`].
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested. Never resolves if every trigger
    /// is dropped without firing. Cancel-safe.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

// ── Monitor ─────────────────────────────────────────────────────────────

/// Counters reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSummary {
    /// Readings scored.
    pub processed: u64,
    /// Lines dropped: restarts, malformed readings, readings without the feature.
    pub skipped: u64,
    /// Scored readings above the threshold.
    pub anomalies: u64,
}

/// Scores a stream of readings against a fitted detector.
pub struct Monitor<S: ParameterStore = JsonFileStore> {
    detector: Arc<AnomalyDetector<S>>,
    source: Box<dyn ReadingSource>,
    backend: Box<dyn ChartBackend>,
    window: SlidingWindow,
    feature: String,
}

impl<S: ParameterStore> Monitor<S> {
    pub fn new(
        detector: Arc<AnomalyDetector<S>>,
        source: Box<dyn ReadingSource>,
        backend: Box<dyn ChartBackend>,
        config: &MonitoringConfig,
    ) -> Self {
        Self {
            detector,
            source,
            backend,
            window: SlidingWindow::new(config.data_length),
            feature: config.feature.clone(),
        }
    }

    /// Recent readings.
    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// Run until end of stream or until `shutdown` fires.
    ///
    /// Detector errors (`NotFitted`, `DegenerateParameters`) and source I/O
    /// errors end the loop and are returned.
    pub async fn run(&mut self, mut shutdown: ShutdownSignal) -> MonitorResult<MonitorSummary> {
        let mut summary = MonitorSummary::default();
        info!(
            feature = %self.feature,
            window = self.window.capacity(),
            "monitoring started"
        );

        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break;
                }
                line = self.source.next_line() => line?,
            };

            let Some(line) = line else {
                info!("end of stream");
                break;
            };

            self.handle_line(&line, &mut summary)?;
        }

        self.backend.finish(&summary)?;
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            anomalies = summary.anomalies,
            "monitoring stopped"
        );
        Ok(summary)
    }

    fn handle_line(&mut self, line: &str, summary: &mut MonitorSummary) -> MonitorResult<()> {
        let reading = match Reading::parse(line) {
            Ok(reading) => reading,
            Err(MonitorError::InvalidHeader(_)) => {
                debug!(line, "device restarting, line skipped");
                summary.skipped += 1;
                return Ok(());
            }
            Err(e @ MonitorError::MalformedReading { .. }) => {
                warn!(error = %e, "malformed reading skipped");
                summary.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let Some(value) = reading.get(&self.feature) else {
            warn!(feature = %self.feature, timestamp = %reading.timestamp, "reading without feature skipped");
            summary.skipped += 1;
            return Ok(());
        };

        let verdict = self.detector.evaluate(value)?;
        self.window.push(&reading);

        summary.processed += 1;
        if verdict.is_normal {
            debug!(value, score = verdict.score, "normal");
        } else {
            summary.anomalies += 1;
            info!(
                timestamp = %reading.timestamp,
                value,
                score = verdict.score,
                threshold = verdict.threshold,
                "anomaly detected"
            );
        }

        self.backend.render(&Frame {
            reading: &reading,
            feature: &self.feature,
            value,
            verdict,
            window: self.window.summary(&self.feature),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use sensorwatch_anomaly::{AnomalyError, FitOptions, FittedParameters, InMemoryStore};
    use tokio::io::BufReader;

    use super::*;
    use crate::backend::{JsonLinesBackend, SharedBuffer};
    use crate::source::{LineSource, SimulatedSource};

    fn fitted_detector() -> Arc<AnomalyDetector<InMemoryStore>> {
        let detector = AnomalyDetector::new(InMemoryStore::new()).unwrap();
        let dataset: Vec<f64> = (0..100).map(f64::from).collect();
        detector.fit(&dataset, FitOptions::default()).unwrap();
        Arc::new(detector)
    }

    fn line_source(text: &'static str) -> Box<dyn ReadingSource> {
        Box::new(LineSource::new(BufReader::new(text.as_bytes())))
    }

    /// Never yields a line.
    struct SilentSource;

    #[async_trait]
    impl ReadingSource for SilentSource {
        async fn next_line(&mut self) -> MonitorResult<Option<String>> {
            std::future::pending().await
        }
    }

    // score(v) = v - 49.5² / 833.25 = v - 2.9406; threshold 7.879
    const STREAM: &str = "\
rst:0x1 (POWERON_RESET),boot:0x13
TimeStamp: 2022/03/01 10:00:00.0, Temperature[degC]: 24.0, Humidity[%]: 10.0
TimeStamp: 2022/03/01 10:00:01.0, Temperature[degC]: 24.0, Humidity[%]: 60.0
TimeStamp: 2022/03/01 10:00:02.0, Temperature[degC]: 24.1
TimeStamp: 2022/03/01 10:00:03.0, Temperature[degC]: 24.1, Humidity[%]: dry
TimeStamp: 2022/03/01 10:00:03.5, Temperature[degC]: 24.1, Humidity[%]: nan
TimeStamp: 2022/03/01 10:00:04.0, Temperature[degC]: 24.2, Humidity[%]: 5.0
";

    #[tokio::test]
    async fn scores_stream_and_counts_skips() {
        let buffer = SharedBuffer::default();
        let mut monitor = Monitor::new(
            fitted_detector(),
            line_source(STREAM),
            Box::new(JsonLinesBackend::new(buffer.clone())),
            &MonitoringConfig::default(),
        );

        let (_trigger, signal) = Shutdown::new();
        let summary = monitor.run(signal).await.unwrap();

        assert_eq!(
            summary,
            MonitorSummary {
                processed: 3,
                skipped: 4,
                anomalies: 1,
            }
        );

        let records: Vec<serde_json::Value> = buffer
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["isNormal"], true);
        assert_eq!(records[1]["isNormal"], false);
        assert_eq!(records[1]["window"]["max"], 60.0);
        assert_eq!(records[2]["window"]["count"], 3);
        assert_eq!(monitor.window().len(), 3);
    }

    #[tokio::test]
    async fn unfitted_detector_stops_the_loop() {
        let detector = Arc::new(AnomalyDetector::new(InMemoryStore::new()).unwrap());
        let mut monitor = Monitor::new(
            detector,
            line_source(STREAM),
            Box::new(JsonLinesBackend::new(Vec::new())),
            &MonitoringConfig::default(),
        );

        let (_trigger, signal) = Shutdown::new();
        let err = monitor.run(signal).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Detector(AnomalyError::NotFitted(_))
        ));
        assert!(monitor.window().is_empty());
    }

    #[tokio::test]
    async fn degenerate_parameters_leave_window_untouched() {
        let params = FittedParameters {
            mean: Some(40.0),
            variance: Some(0.0),
            threshold: Some(7.9),
            ..FittedParameters::uninitialized()
        };
        let detector = Arc::new(AnomalyDetector::new(InMemoryStore::with_params(params)).unwrap());
        let mut monitor = Monitor::new(
            detector,
            line_source(STREAM),
            Box::new(JsonLinesBackend::new(Vec::new())),
            &MonitoringConfig::default(),
        );

        let (_trigger, signal) = Shutdown::new();
        let err = monitor.run(signal).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::Detector(AnomalyError::DegenerateParameters(_))
        ));
        assert!(monitor.window().is_empty());
        assert!(monitor.window().summary("Humidity[%]").is_none());
    }

    #[tokio::test]
    async fn trigger_before_run_processes_nothing() {
        let buffer = SharedBuffer::default();
        let mut monitor = Monitor::new(
            fitted_detector(),
            line_source(STREAM),
            Box::new(JsonLinesBackend::new(buffer.clone())),
            &MonitoringConfig::default(),
        );

        let (trigger, signal) = Shutdown::new();
        trigger.trigger();
        assert!(signal.is_cancelled());

        let summary = monitor.run(signal).await.unwrap();
        assert_eq!(summary, MonitorSummary::default());
        assert!(buffer.contents().is_empty());
    }

    #[tokio::test]
    async fn trigger_interrupts_waiting_source() {
        let mut monitor = Monitor::new(
            fitted_detector(),
            Box::new(SilentSource),
            Box::new(JsonLinesBackend::new(Vec::new())),
            &MonitoringConfig::default(),
        );

        let (trigger, signal) = Shutdown::new();
        let handle = tokio::spawn(async move { monitor.run(signal).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();

        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[tokio::test]
    async fn dropped_trigger_does_not_stop_the_loop() {
        let (trigger, mut signal) = Shutdown::new();
        drop(trigger);
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn simulated_stream_runs_to_completion() {
        let config = MonitoringConfig {
            data_length: 5,
            ..MonitoringConfig::default()
        };
        let mut monitor = Monitor::new(
            fitted_detector(),
            Box::new(SimulatedSource::new(Duration::ZERO, Some(20), Some(11))),
            Box::new(JsonLinesBackend::new(Vec::new())),
            &config,
        );

        let (_trigger, signal) = Shutdown::new();
        let summary = monitor.run(signal).await.unwrap();
        assert_eq!(summary.processed, 20);
        assert_eq!(summary.skipped, 0);
        assert_eq!(monitor.window().len(), 5);
    }
}
