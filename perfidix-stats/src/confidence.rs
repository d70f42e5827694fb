//! Confidence Intervals
//!
//! Symmetric normal-approximation bounds for the mean:
//!
//! ```text
//! mean ± z(level) * std_dev / sqrt(n)
//! ```
//!
//! where `z(level)` is the standard normal quantile at `(1 + level) / 2` and
//! `std_dev` is the sample standard deviation.

use crate::summary::SummaryStatistics;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when configuring confidence levels
#[derive(Debug, Error, PartialEq)]
pub enum ConfidenceError {
    #[error("Invalid confidence level: {0} (must be between 0 and 1)")]
    InvalidLevel(f64),
}

/// Confidence interval bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Confidence level the bounds were computed for
    pub level: f64,
}

impl ConfidenceInterval {
    /// Whether `value` lies inside the bounds (inclusive)
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// The two confidence levels reported alongside every mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceLevels {
    first: f64,
    second: f64,
}

impl ConfidenceLevels {
    /// Create a validated pair of levels, each strictly between 0 and 1
    pub fn new(first: f64, second: f64) -> Result<Self, ConfidenceError> {
        for level in [first, second] {
            if !(level > 0.0 && level < 1.0) {
                return Err(ConfidenceError::InvalidLevel(level));
            }
        }
        Ok(Self { first, second })
    }

    /// First (usually narrower) level
    pub fn first(&self) -> f64 {
        self.first
    }

    /// Second level
    pub fn second(&self) -> f64 {
        self.second
    }

    /// Both levels in order
    pub fn levels(&self) -> [f64; 2] {
        [self.first, self.second]
    }
}

impl Default for ConfidenceLevels {
    fn default() -> Self {
        let [first, second] = crate::DEFAULT_CONFIDENCE_LEVELS;
        Self { first, second }
    }
}

/// Confidence interval of the mean for an already summarized series.
///
/// Series with fewer than two samples collapse to `[mean, mean]`.
pub fn confidence_interval(summary: &SummaryStatistics, level: f64) -> ConfidenceInterval {
    if summary.count < 2 {
        return ConfidenceInterval {
            lower: summary.mean,
            upper: summary.mean,
            level,
        };
    }

    let z = normal_quantile((1.0 + level) / 2.0);
    let half_width = z * summary.standard_error();

    ConfidenceInterval {
        lower: summary.mean - half_width,
        upper: summary.mean + half_width,
        level,
    }
}

/// Standard normal quantile (inverse CDF).
///
/// Abramowitz and Stegun rational approximation 26.2.23, absolute error
/// below 4.5e-4.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (sign, tail) = if p < 0.5 { (-1.0, p) } else { (1.0, 1.0 - p) };
    let t = (-2.0 * tail.max(1e-300).ln()).sqrt();

    const C: [f64; 3] = [2.515517, 0.802853, 0.010328];
    const D: [f64; 3] = [1.432788, 0.189269, 0.001308];

    let numerator = C[0] + C[1] * t + C[2] * t * t;
    let denominator = 1.0 + D[0] * t + D[1] * t * t + D[2] * t * t * t;

    sign * (t - numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_summary;

    #[test]
    fn test_normal_quantile_known_values() {
        assert!(normal_quantile(0.5).abs() < 0.01);
        assert!((normal_quantile(0.975) - 1.96).abs() < 0.01);
        assert!((normal_quantile(0.025) + 1.96).abs() < 0.01);
        assert!((normal_quantile(0.995) - 2.576).abs() < 0.01);
    }

    #[test]
    fn test_interval_contains_mean() {
        let samples: Vec<f64> = (1..=10).map(f64::from).collect();
        let summary = compute_summary(&samples);
        let ci95 = confidence_interval(&summary, 0.95);
        let ci99 = confidence_interval(&summary, 0.99);

        assert!(ci95.contains(summary.mean));
        assert!(ci99.lower < ci95.lower);
        assert!(ci99.upper > ci95.upper);
        // Symmetric around the mean
        assert!(((summary.mean - ci95.lower) - (ci95.upper - summary.mean)).abs() < 1e-9);
    }

    #[test]
    fn test_interval_degenerate() {
        let summary = compute_summary(&[4.0]);
        let ci = confidence_interval(&summary, 0.95);
        assert_eq!(ci.lower, 4.0);
        assert_eq!(ci.upper, 4.0);

        let empty = confidence_interval(&compute_summary(&[]), 0.95);
        assert_eq!(empty.lower, 0.0);
        assert_eq!(empty.upper, 0.0);
    }

    #[test]
    fn test_invalid_levels() {
        assert_eq!(
            ConfidenceLevels::new(0.0, 0.99),
            Err(ConfidenceError::InvalidLevel(0.0))
        );
        assert!(ConfidenceLevels::new(0.9, 1.0).is_err());
        assert!(ConfidenceLevels::new(0.9, f64::NAN).is_err());
        assert!(ConfidenceLevels::new(0.9, 0.99).is_ok());
    }
}
