//! The persisted parameter record.
//!
//! `FittedParameters` is the only state that survives a restart. The JSON
//! layout is the operator-facing contract: pretty-printed, keys in
//! declaration order followed by caller extras in insertion order, so the
//! file can be inspected and hand-edited.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AnomalyError, AnomalyResult};
use crate::{DEFAULT_CONFIDENCE, DEFAULT_DEGREES_OF_FREEDOM, DEFAULT_LABEL, FITTED_AT_FORMAT};

/// Fitted scoring parameters.
///
/// `mean` and `variance` are always written (as `null` until the first
/// fit); every other field is omitted while unset. Keys written by the
/// older tool (`alpha`, `df`, `memo`, `timestamp`) are accepted on read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FittedParameters {
    /// Sample mean of the calibration dataset.
    #[serde(default)]
    pub mean: Option<f64>,
    /// Population variance (divisor N) of the calibration dataset.
    #[serde(default)]
    pub variance: Option<f64>,
    /// Probability mass of the chi-squared interval.
    #[serde(default, alias = "alpha", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Chi-squared degrees of freedom.
    #[serde(default, alias = "df", skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<f64>,
    /// Decision threshold: scores at or below are normal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    /// Free-text description of the model.
    #[serde(default, alias = "memo", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Local fit time, `YYYY/MM/DD-HH:MM:SS.ffffff`.
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub fitted_at: Option<String>,
    /// Caller-supplied fields that have no typed counterpart.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FittedParameters {
    /// The record of a detector that has never been fitted.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Build a freshly fitted record stamped with the current local time.
    pub(crate) fn fitted(
        mean: f64,
        variance: f64,
        confidence: f64,
        degrees_of_freedom: f64,
        threshold: f64,
    ) -> Self {
        Self {
            mean: Some(mean),
            variance: Some(variance),
            confidence: Some(confidence),
            degrees_of_freedom: Some(degrees_of_freedom),
            threshold: Some(threshold),
            label: Some(DEFAULT_LABEL.to_string()),
            fitted_at: Some(Local::now().format(FITTED_AT_FORMAT).to_string()),
            extra: Map::new(),
        }
    }

    /// Whether mean, variance and threshold are all present.
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.variance.is_some() && self.threshold.is_some()
    }

    /// Confidence used for the threshold, or the default when unset.
    pub fn confidence_or_default(&self) -> f64 {
        self.confidence.unwrap_or(DEFAULT_CONFIDENCE)
    }

    /// Degrees of freedom used for the threshold, or the default when unset.
    pub fn degrees_of_freedom_or_default(&self) -> f64 {
        self.degrees_of_freedom.unwrap_or(DEFAULT_DEGREES_OF_FREEDOM)
    }

    /// Merge `overrides` on top of this record.
    ///
    /// Any key may be replaced, typed fields included. The merged document
    /// is re-read through serde, so an override of the wrong type (a
    /// string `mean`, say) is rejected instead of corrupting the record.
    pub fn with_overrides(self, overrides: &Map<String, Value>) -> AnomalyResult<Self> {
        if overrides.is_empty() {
            return Ok(self);
        }

        let mut doc = match serde_json::to_value(&self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(AnomalyError::InvalidInput(format!(
                    "parameter record serialized to non-object: {}",
                    other
                )))
            }
            Err(e) => {
                return Err(AnomalyError::InvalidInput(format!(
                    "parameter record serialization failed: {}",
                    e
                )))
            }
        };

        for (key, value) in overrides {
            doc.insert(canonical_key(key).to_string(), value.clone());
        }

        serde_json::from_value(Value::Object(doc))
            .map_err(|e| AnomalyError::InvalidInput(format!("invalid override: {}", e)))
    }
}

/// Map a key written by the older tool to the key this record serializes.
fn canonical_key(key: &str) -> &str {
    match key {
        "alpha" => "confidence",
        "df" => "degreesOfFreedom",
        "memo" => "label",
        "timestamp" => "fittedAt",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uninitialized_serializes_null_mean_and_variance_only() {
        let json = serde_json::to_value(FittedParameters::uninitialized()).unwrap();
        assert_eq!(json, json!({ "mean": null, "variance": null }));
    }

    #[test]
    fn fitted_record_has_defaults() {
        let p = FittedParameters::fitted(1.0, 2.0, 0.95, 3.0, 7.8);
        assert!(p.is_fitted());
        assert_eq!(p.label.as_deref(), Some(DEFAULT_LABEL));

        // YYYY/MM/DD-HH:MM:SS.ffffff
        let ts = p.fitted_at.unwrap();
        assert_eq!(ts.len(), 26);
        assert_eq!(&ts[4..5], "/");
        assert_eq!(&ts[10..11], "-");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn key_order_is_declaration_then_extras() {
        let mut p = FittedParameters::fitted(1.0, 2.0, 0.99, 1.0, 7.9);
        p.extra.insert("sensor".into(), json!("SHT35"));
        p.extra.insert("location".into(), json!("lab"));

        let text = serde_json::to_string_pretty(&p).unwrap();
        let keys = [
            "\"mean\"",
            "\"variance\"",
            "\"confidence\"",
            "\"degreesOfFreedom\"",
            "\"threshold\"",
            "\"label\"",
            "\"fittedAt\"",
            "\"sensor\"",
            "\"location\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
    }

    #[test]
    fn legacy_keys_are_accepted() {
        let doc = json!({
            "mean": 45.0,
            "variance": 4.0,
            "alpha": 0.99,
            "df": 1.0,
            "threshold": 7.88,
            "memo": "Hotelling T-squared distribution",
            "timestamp": "2022/03/01-10:00:00.000000"
        });
        let p: FittedParameters = serde_json::from_value(doc).unwrap();
        assert_eq!(p.confidence, Some(0.99));
        assert_eq!(p.degrees_of_freedom, Some(1.0));
        assert_eq!(p.label.as_deref(), Some("Hotelling T-squared distribution"));
        assert!(p.extra.is_empty());
        assert!(p.is_fitted());
    }

    #[test]
    fn unknown_keys_land_in_extra() {
        let doc = json!({ "mean": 1.0, "variance": 1.0, "operator": "kazuto" });
        let p: FittedParameters = serde_json::from_value(doc).unwrap();
        assert_eq!(p.extra.get("operator"), Some(&json!("kazuto")));
        assert!(!p.is_fitted());
    }

    #[test]
    fn overrides_replace_typed_fields() {
        let p = FittedParameters::fitted(1.0, 2.0, 0.99, 1.0, 7.9);
        let mut overrides = Map::new();
        overrides.insert("threshold".into(), json!(100.0));
        overrides.insert("note".into(), json!("manual"));

        let merged = p.with_overrides(&overrides).unwrap();
        assert_eq!(merged.threshold, Some(100.0));
        assert_eq!(merged.mean, Some(1.0));
        assert_eq!(merged.extra.get("note"), Some(&json!("manual")));
    }

    #[test]
    fn override_of_wrong_type_is_rejected() {
        let p = FittedParameters::fitted(1.0, 2.0, 0.99, 1.0, 7.9);
        let mut overrides = Map::new();
        overrides.insert("mean".into(), json!("high"));

        let err = p.with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidInput(_)));
    }

    #[test]
    fn legacy_override_keys_replace_their_fields() {
        let base = || FittedParameters::fitted(1.0, 2.0, 0.99, 1.0, 7.9);
        let single = |key: &str, value: Value| {
            let mut overrides = Map::new();
            overrides.insert(key.into(), value);
            base().with_overrides(&overrides).unwrap()
        };

        let merged = single("memo", json!("humidifier test"));
        assert_eq!(merged.label.as_deref(), Some("humidifier test"));
        assert!(merged.extra.is_empty());

        let merged = single("alpha", json!(0.95));
        assert_eq!(merged.confidence, Some(0.95));
        assert!(merged.extra.is_empty());

        let merged = single("df", json!(2.0));
        assert_eq!(merged.degrees_of_freedom, Some(2.0));
        assert!(merged.extra.is_empty());

        let merged = single("timestamp", json!("2022/03/01-10:00:00.000000"));
        assert_eq!(merged.fitted_at.as_deref(), Some("2022/03/01-10:00:00.000000"));
        assert!(merged.extra.is_empty());

        let text = serde_json::to_string(&merged).unwrap();
        assert!(!text.contains("\"timestamp\""));
    }

    #[test]
    fn legacy_override_key_is_type_checked() {
        let mut overrides = Map::new();
        overrides.insert("alpha".into(), json!("high"));
        let err = FittedParameters::fitted(1.0, 2.0, 0.99, 1.0, 7.9)
            .with_overrides(&overrides)
            .unwrap_err();
        assert!(matches!(err, AnomalyError::InvalidInput(_)));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let p = FittedParameters::uninitialized();
        assert_eq!(p.confidence_or_default(), DEFAULT_CONFIDENCE);
        assert_eq!(p.degrees_of_freedom_or_default(), DEFAULT_DEGREES_OF_FREEDOM);
    }
}
