//! Decision threshold from the chi-squared distribution.
//!
//! The threshold is the upper bound of the central (two-sided) interval of
//! χ²(df) holding `confidence` of the probability mass, i.e. the quantile at
//! `(1 + confidence) / 2`. For confidence 0.99 and one degree of freedom
//! that is Q(0.995) ≈ 7.879, not the one-sided Q(0.99) ≈ 6.635.

use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF};

use crate::error::{AnomalyError, AnomalyResult};

/// Newton refinement steps applied after statrs' quantile search.
const NEWTON_STEPS: usize = 8;

/// Relative step size at which refinement stops.
const NEWTON_TOLERANCE: f64 = 1e-12;

/// Check that `confidence` lies strictly inside (0, 1).
pub fn validate_confidence(confidence: f64) -> AnomalyResult<()> {
    if confidence > 0.0 && confidence < 1.0 {
        Ok(())
    } else {
        Err(AnomalyError::InvalidInput(format!(
            "confidence must be in (0, 1), got {}",
            confidence
        )))
    }
}

/// Check that `degrees_of_freedom` is finite and positive.
pub fn validate_degrees_of_freedom(degrees_of_freedom: f64) -> AnomalyResult<()> {
    if degrees_of_freedom.is_finite() && degrees_of_freedom > 0.0 {
        Ok(())
    } else {
        Err(AnomalyError::InvalidInput(format!(
            "degrees of freedom must be positive, got {}",
            degrees_of_freedom
        )))
    }
}

/// Central interval of χ²(`degrees_of_freedom`) containing `confidence`.
pub fn chi_squared_interval(confidence: f64, degrees_of_freedom: f64) -> AnomalyResult<(f64, f64)> {
    validate_confidence(confidence)?;
    validate_degrees_of_freedom(degrees_of_freedom)?;

    let dist = ChiSquared::new(degrees_of_freedom)
        .map_err(|e| AnomalyError::InvalidInput(format!("chi-squared distribution: {}", e)))?;

    let tail = (1.0 - confidence) / 2.0;
    let lower = quantile(&dist, tail)?;
    let upper = quantile(&dist, 1.0 - tail)?;
    Ok((lower, upper))
}

/// Upper critical value of the two-sided interval: the fitted threshold.
pub fn upper_critical_value(confidence: f64, degrees_of_freedom: f64) -> AnomalyResult<f64> {
    chi_squared_interval(confidence, degrees_of_freedom).map(|(_, upper)| upper)
}

fn quantile(dist: &ChiSquared, p: f64) -> AnomalyResult<f64> {
    let mut x = dist.inverse_cdf(p);
    if !x.is_finite() {
        return Err(AnomalyError::InvalidInput(format!(
            "chi-squared quantile at {} is not finite",
            p
        )));
    }

    for _ in 0..NEWTON_STEPS {
        let density = dist.pdf(x);
        if !(density.is_finite() && density > 0.0) {
            break;
        }
        let step = (dist.cdf(x) - p) / density;
        let next = x - step;
        if !next.is_finite() || next <= 0.0 {
            break;
        }
        x = next;
        if step.abs() <= NEWTON_TOLERANCE * x.max(1.0) {
            break;
        }
    }

    Ok(x)
}
