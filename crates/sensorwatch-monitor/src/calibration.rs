//! Calibration dataset loading.
//!
//! A dataset file holds one sample per line, either as a bare number or as
//! a captured transport line. Captured logs (see [`RawLog`](crate::source::RawLog))
//! can therefore be fed to `fit` unchanged.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{MonitorError, MonitorResult};
use crate::reading::Reading;

/// Read the calibration samples for `feature` from `path`.
pub fn load_dataset(path: impl AsRef<Path>, feature: &str) -> MonitorResult<Vec<f64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let dataset = parse_dataset(&text, feature)?;
    info!(
        path = %path.display(),
        feature,
        samples = dataset.len(),
        "loaded calibration dataset"
    );
    Ok(dataset)
}

/// Same as [`load_dataset`], from text already in memory.
pub fn parse_dataset(text: &str, feature: &str) -> MonitorResult<Vec<f64>> {
    let mut dataset = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Ok(value) = line.parse::<f64>() {
            if !value.is_finite() {
                return Err(MonitorError::MalformedReading {
                    line: line.to_string(),
                    reason: format!("line {} is not a finite number", index + 1),
                });
            }
            dataset.push(value);
            continue;
        }

        match Reading::parse(line) {
            Ok(reading) => dataset.push(reading.feature(feature)?),
            Err(MonitorError::InvalidHeader(_)) if !looks_numeric(line) => {
                debug!(line = index + 1, "skipping restart line");
            }
            Err(MonitorError::InvalidHeader(_)) => {
                return Err(MonitorError::MalformedReading {
                    line: line.to_string(),
                    reason: format!("line {} is not a number", index + 1),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(dataset)
}

// "12.5abc" is a broken sample, not boot chatter.
fn looks_numeric(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = "Humidity[%]";

    #[test]
    fn bare_numbers() {
        let dataset = parse_dataset("1\n2.5\n\n-3e1\n", FEATURE).unwrap();
        assert_eq!(dataset, vec![1.0, 2.5, -30.0]);
    }

    #[test]
    fn transport_lines_and_restarts() {
        let text = "\
ets Jun  8 2016 00:22:57
TimeStamp: 2022/03/01 10:00:00.0, Temperature[degC]: 24.0, Humidity[%]: 40.5
TimeStamp: 2022/03/01 10:00:01.0, Temperature[degC]: 24.1, Humidity[%]: 41.0
41.5
";
        let dataset = parse_dataset(text, FEATURE).unwrap();
        assert_eq!(dataset, vec![40.5, 41.0, 41.5]);
    }

    #[test]
    fn missing_feature_fails() {
        let err = parse_dataset("TimeStamp: t, Temperature[degC]: 24.0\n", FEATURE).unwrap_err();
        assert!(matches!(err, MonitorError::MissingFeature(_)));
    }

    #[test]
    fn broken_number_is_malformed() {
        let err = parse_dataset("40.0\n41.0x\n", FEATURE).unwrap_err();
        assert!(matches!(err, MonitorError::MalformedReading { .. }));

        let err = parse_dataset("TimeStamp: t, Humidity[%]: wet\n", FEATURE).unwrap_err();
        assert!(matches!(err, MonitorError::MalformedReading { .. }));

        let err = parse_dataset("40.0\nNaN\n", FEATURE).unwrap_err();
        assert!(matches!(err, MonitorError::MalformedReading { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.txt");
        std::fs::write(&path, (0..100).map(|i| format!("{}\n", i)).collect::<String>()).unwrap();

        let dataset = load_dataset(&path, FEATURE).unwrap();
        assert_eq!(dataset.len(), 100);
        assert_eq!(dataset[99], 99.0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(dir.path().join("absent.txt"), FEATURE).unwrap_err();
        assert!(matches!(err, MonitorError::Io(_)));
    }
}
