//! Summary Statistics
//!
//! Every figure is computed over ALL samples; benchmark repetitions are never
//! dropped as outliers because a slow repetition is itself a measurement.

use crate::percentiles::interpolate_sorted;
use serde::{Deserialize, Serialize};

/// Summary of one sample series
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStatistics {
    /// Number of samples
    pub count: usize,
    /// Sum of all samples
    pub sum: f64,
    /// Smallest sample
    pub min: f64,
    /// Largest sample
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample variance (n - 1 denominator, 0 for fewer than two samples)
    pub variance: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Median (50th percentile)
    pub median: f64,
}

/// Compute summary statistics for a series.
///
/// An empty series yields all zeros.
pub fn compute_summary(samples: &[f64]) -> SummaryStatistics {
    if samples.is_empty() {
        return SummaryStatistics::default();
    }

    let count = samples.len();
    let sum: f64 = samples.iter().sum();
    let mean = sum / count as f64;

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let min = sorted[0];
    let max = sorted[count - 1];

    let variance = if count < 2 {
        0.0
    } else {
        samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1) as f64
    };

    SummaryStatistics {
        count,
        sum,
        min,
        max,
        // Floating point summation can push the mean a hair outside the range
        mean: mean.clamp(min, max),
        variance,
        std_dev: variance.sqrt(),
        median: interpolate_sorted(&sorted, 50.0),
    }
}

impl SummaryStatistics {
    /// Coefficient of variation in percent
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean == 0.0 {
            0.0
        } else {
            (self.std_dev / self.mean) * 100.0
        }
    }

    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.std_dev / (self.count as f64).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_to_ten() {
        let samples: Vec<f64> = (1..=10).map(f64::from).collect();
        let summary = compute_summary(&samples);

        assert_eq!(summary.count, 10);
        assert_eq!(summary.sum, 55.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 10.0);
        assert!((summary.mean - 5.5).abs() < f64::EPSILON);
        assert!((summary.median - 5.5).abs() < f64::EPSILON);
        // Sample variance of 1..=10 is 55/6
        assert!((summary.variance - 55.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample() {
        let summary = compute_summary(&[7.0]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.min, 7.0);
        assert_eq!(summary.max, 7.0);
        assert_eq!(summary.mean, 7.0);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_empty_samples() {
        let summary = compute_summary(&[]);
        assert_eq!(summary, SummaryStatistics::default());
        assert_eq!(summary.standard_error(), 0.0);
    }

    #[test]
    fn test_min_mean_max_ordering() {
        let samples = vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        let summary = compute_summary(&samples);
        assert!(summary.min <= summary.mean && summary.mean <= summary.max);
    }

    #[test]
    fn test_idempotent() {
        let samples = vec![3.5, 1.25, 9.0, 4.75];
        assert_eq!(compute_summary(&samples), compute_summary(&samples));
    }

    #[test]
    fn test_coefficient_of_variation() {
        let summary = compute_summary(&[100.0, 100.0, 100.0]);
        assert_eq!(summary.coefficient_of_variation(), 0.0);
    }
}
