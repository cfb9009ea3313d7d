//! Parsing of sensor transport lines.
//!
//! The firmware prints one line per sample:
//!
//! ```text
//! TimeStamp: 2022/03/01 10:00:00.123456, ElapsedTime[s]: 12.3, Temperature[degC]: 24.1, Humidity[%]: 41.8
//! ```
//!
//! Fields are separated by `", "`, names from values by the first `": "`.
//! Anything that does not start with `TimeStamp` is boot chatter from a
//! restarting device.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Name of the leading timestamp field.
pub const TIMESTAMP_FIELD: &str = "TimeStamp";

/// `chrono` format of the firmware timestamp.
pub const READING_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.f";

/// One parsed sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Timestamp exactly as sent.
    pub timestamp: String,
    /// Parsed timestamp, when it matches the firmware format.
    pub recorded_at: Option<NaiveDateTime>,
    /// Numeric fields in transport order.
    pub values: Vec<(String, f64)>,
}

impl Reading {
    /// Parse one transport line (trailing `\r\n` allowed).
    pub fn parse(line: &str) -> MonitorResult<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.starts_with(TIMESTAMP_FIELD) {
            return Err(MonitorError::InvalidHeader(line.to_string()));
        }

        let mut timestamp = None;
        let mut values = Vec::new();

        for field in line.split(", ") {
            let (name, raw) = field.split_once(": ").ok_or_else(|| MonitorError::MalformedReading {
                line: line.to_string(),
                reason: format!("field {:?} has no \": \" separator", field),
            })?;

            if name == TIMESTAMP_FIELD {
                timestamp = Some(raw.to_string());
                continue;
            }

            let value = raw.trim().parse::<f64>().map_err(|_| MonitorError::MalformedReading {
                line: line.to_string(),
                reason: format!("{} is not a number: {:?}", name, raw),
            })?;
            if !value.is_finite() {
                return Err(MonitorError::MalformedReading {
                    line: line.to_string(),
                    reason: format!("{} is not finite: {:?}", name, raw),
                });
            }
            values.push((name.to_string(), value));
        }

        let timestamp = timestamp.unwrap_or_default();
        let recorded_at = NaiveDateTime::parse_from_str(&timestamp, READING_TIMESTAMP_FORMAT).ok();

        Ok(Self {
            timestamp,
            recorded_at,
            values,
        })
    }

    /// Value of the named field.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    /// Value of the named field, or `MissingFeature`.
    pub fn feature(&self, name: &str) -> MonitorResult<f64> {
        self.get(name)
            .ok_or_else(|| MonitorError::MissingFeature(name.to_string()))
    }
}
