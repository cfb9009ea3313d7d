//! Bounded per-field history of recent readings, for charting.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Min/max/latest of one field over the window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub count: usize,
}

/// Sliding window over the last `capacity` readings.
///
/// Oldest entries are evicted first. Fields that appear mid-stream start
/// their own series; they are not back-filled.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    timestamps: VecDeque<String>,
    series: HashMap<String, VecDeque<f64>>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            timestamps: VecDeque::with_capacity(capacity),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of readings currently held.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, reading: &Reading) {
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(reading.timestamp.clone());

        let capacity = self.capacity;
        for (name, value) in &reading.values {
            let series = self
                .series
                .entry(name.clone())
                .or_insert_with(|| VecDeque::with_capacity(capacity));
            if series.len() == capacity {
                series.pop_front();
            }
            series.push_back(*value);
        }
    }

    /// Timestamps in arrival order.
    pub fn timestamps(&self) -> &VecDeque<String> {
        &self.timestamps
    }

    /// Values of one field in arrival order.
    pub fn series(&self, name: &str) -> Option<&VecDeque<f64>> {
        self.series.get(name)
    }

    pub fn summary(&self, name: &str) -> Option<SeriesSummary> {
        let series = self.series.get(name)?;
        let latest = *series.back()?;
        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Some(SeriesSummary {
            min,
            max,
            latest,
            count: series.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: &str, humidity: f64) -> Reading {
        Reading {
            timestamp: ts.to_string(),
            recorded_at: None,
            values: vec![
                ("Temperature[degC]".to_string(), 24.0),
                ("Humidity[%]".to_string(), humidity),
            ],
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut window = SlidingWindow::new(3);
        for (i, h) in [40.0, 41.0, 42.0, 43.0, 44.0].iter().enumerate() {
            window.push(&reading(&format!("t{}", i), *h));
        }

        assert_eq!(window.len(), 3);
        assert_eq!(
            window.series("Humidity[%]").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![42.0, 43.0, 44.0]
        );
        assert_eq!(window.timestamps().front().map(String::as_str), Some("t2"));
    }

    #[test]
    fn summary_tracks_extremes() {
        let mut window = SlidingWindow::new(10);
        for h in [41.0, 75.0, 39.5, 40.0] {
            window.push(&reading("t", h));
        }
        let summary = window.summary("Humidity[%]").unwrap();
        assert_eq!(summary.min, 39.5);
        assert_eq!(summary.max, 75.0);
        assert_eq!(summary.latest, 40.0);
        assert_eq!(summary.count, 4);
    }

    #[test]
    fn unknown_field_has_no_summary() {
        let mut window = SlidingWindow::new(2);
        assert!(window.summary("Humidity[%]").is_none());
        window.push(&reading("t", 40.0));
        assert!(window.summary("Pressure[hPa]").is_none());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = SlidingWindow::new(0);
        window.push(&reading("a", 1.0));
        window.push(&reading("b", 2.0));
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.summary("Humidity[%]").unwrap().latest, 2.0);
    }
}
