#![warn(missing_docs)]
//! Perfidix Statistical Engine
//!
//! Pure functions over raw sample series:
//! - Summary statistics (sum, min, max, mean, variance, standard deviation, median)
//! - Percentiles with linear interpolation
//! - Normal-approximation confidence intervals for the mean
//!
//! Nothing in here keeps state: the same samples always give the same numbers.

mod confidence;
mod percentiles;
mod summary;

pub use confidence::{
    ConfidenceError, ConfidenceInterval, ConfidenceLevels, confidence_interval, normal_quantile,
};
pub use summary::{SummaryStatistics, compute_summary};

/// Default confidence levels reported next to every mean (95% and 99%)
pub const DEFAULT_CONFIDENCE_LEVELS: [f64; 2] = [0.95, 0.99];
