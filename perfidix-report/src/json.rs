//! JSON Output

use crate::summary::{MeterSummary, summarize};
use chrono::{DateTime, Utc};
use perfidix_core::{Arrangement, BenchmarkResult, ConfidenceLevels};
use serde::Serialize;

/// Version of the JSON layout
pub const SCHEMA_VERSION: u32 = 1;

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    /// Layout version
    pub schema_version: u32,
    /// Version of the producing crate
    pub version: String,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Method order of the run
    pub arrangement: Arrangement,
    /// Shuffle seed, to replay the order
    pub seed: Option<u64>,
    /// Levels of the reported confidence intervals
    pub confidence_levels: [f64; 2],
}

/// Complete JSON document: metadata, computed statistics and the raw result
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    /// Metadata
    pub meta: ReportMeta,
    /// Statistics per meter
    pub statistics: Vec<MeterSummary>,
    /// Raw samples and failures
    pub result: &'a BenchmarkResult,
}

impl<'a> JsonReport<'a> {
    /// Build the report for a result
    pub fn new(result: &'a BenchmarkResult, levels: &ConfidenceLevels) -> Self {
        Self {
            meta: ReportMeta {
                schema_version: SCHEMA_VERSION,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                arrangement: result.arrangement,
                seed: result.seed,
                confidence_levels: levels.levels(),
            },
            statistics: summarize(result, levels),
            result,
        }
    }
}

/// Generate a prettified JSON report.
pub fn generate_json_report(
    result: &BenchmarkResult,
    levels: &ConfidenceLevels,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport::new(result, levels))
}
