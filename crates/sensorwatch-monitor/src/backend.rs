//! Presentation backends.
//!
//! The monitor hands every scored reading to a `ChartBackend`. Which
//! backend runs is a configuration choice (`monitoring.plot_type`); the
//! loop itself never branches on it.

use std::io::Write;

use colored::Colorize;
use sensorwatch_anomaly::Verdict;
use serde::Serialize;
use serde_json::Map;

use crate::config::PlotType;
use crate::error::MonitorResult;
use crate::monitor::MonitorSummary;
use crate::reading::Reading;
use crate::window::SeriesSummary;

/// One scored reading, ready to display.
#[derive(Debug)]
pub struct Frame<'a> {
    pub reading: &'a Reading,
    /// Name of the scored field.
    pub feature: &'a str,
    pub value: f64,
    pub verdict: Verdict,
    /// The scored field over the sliding window.
    pub window: Option<SeriesSummary>,
}

/// Rendering capability used by the monitor loop.
pub trait ChartBackend: Send {
    /// Display one scored reading.
    fn render(&mut self, frame: &Frame<'_>) -> MonitorResult<()>;

    /// Called once when the loop ends.
    fn finish(&mut self, _summary: &MonitorSummary) -> MonitorResult<()> {
        Ok(())
    }
}

/// Build the backend selected by `plot_type`, writing to `writer`.
pub fn backend_for<W>(plot_type: PlotType, writer: W, color: bool) -> Box<dyn ChartBackend>
where
    W: Write + Send + 'static,
{
    match plot_type {
        PlotType::Console => Box::new(ConsoleBackend::new(writer, color)),
        PlotType::JsonLines => Box::new(JsonLinesBackend::new(writer)),
    }
}

// ── Console ─────────────────────────────────────────────────────────────

/// Human-readable status line per reading.
pub struct ConsoleBackend<W> {
    writer: W,
    color: bool,
}

impl<W: Write + Send> ConsoleBackend<W> {
    pub fn new(writer: W, color: bool) -> Self {
        Self { writer, color }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ChartBackend for ConsoleBackend<W> {
    fn render(&mut self, frame: &Frame<'_>) -> MonitorResult<()> {
        let state = if frame.verdict.is_normal { "normal" } else { "anomaly" };
        let status = format!(
            "state: {} (score: {:.3}, threshold: {:.3})",
            state, frame.verdict.score, frame.verdict.threshold
        );
        let status = match (self.color, frame.verdict.is_normal) {
            (false, _) => status,
            (true, true) => status.green().to_string(),
            (true, false) => status.red().bold().to_string(),
        };

        let window = frame
            .window
            .map(|w| format!(" | window[{}] {:.3}..{:.3}", w.count, w.min, w.max))
            .unwrap_or_default();

        writeln!(
            self.writer,
            "{} | {} {:.3}{} | {}",
            frame.reading.timestamp, frame.feature, frame.value, window, status
        )?;
        Ok(())
    }

    fn finish(&mut self, summary: &MonitorSummary) -> MonitorResult<()> {
        writeln!(
            self.writer,
            "fin. {} readings scored, {} anomalies, {} lines skipped",
            summary.processed, summary.anomalies, summary.skipped
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

// ── JSON lines ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameRecord<'a> {
    timestamp: &'a str,
    values: Map<String, serde_json::Value>,
    feature: &'a str,
    score: f64,
    is_normal: bool,
    threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<SeriesSummary>,
}

/// One JSON object per reading, for external dashboards.
pub struct JsonLinesBackend<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesBackend<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ChartBackend for JsonLinesBackend<W> {
    fn render(&mut self, frame: &Frame<'_>) -> MonitorResult<()> {
        let values = frame
            .reading
            .values
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::from(*value)))
            .collect();

        let record = FrameRecord {
            timestamp: &frame.reading.timestamp,
            values,
            feature: frame.feature,
            score: frame.verdict.score,
            is_normal: frame.verdict.is_normal,
            threshold: frame.verdict.threshold,
            window: frame.window,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Cloneable in-memory writer for inspecting backend output in tests.
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
