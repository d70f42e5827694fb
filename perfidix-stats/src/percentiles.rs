//! Percentile Computation
//!
//! Linear interpolation between the two nearest ranks of the sorted series.

/// Percentile (`0.0..=100.0`) over an already sorted, non-empty series.
pub(crate) fn interpolate_sorted(sorted: &[f64], percentile: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(last);
    let fraction = rank - lower as f64;

    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((interpolate_sorted(&sorted, 50.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_median_even_interpolates() {
        let sorted: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!((interpolate_sorted(&sorted, 50.0) - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(interpolate_sorted(&sorted, 0.0), 1.0);
        assert_eq!(interpolate_sorted(&sorted, 100.0), 100.0);
        assert_eq!(interpolate_sorted(&sorted, 250.0), 100.0);
    }

    #[test]
    fn test_single_sample() {
        assert_eq!(interpolate_sorted(&[42.0], 90.0), 42.0);
    }
}
