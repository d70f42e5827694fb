#![warn(missing_docs)]
//! Perfidix Report - Result Output
//!
//! Renders a finished [`perfidix_core::BenchmarkResult`]:
//! - ASCII tables (one per meter, with class and overall summaries)
//! - CSV (statistics summary, or raw samples per method and meter)
//! - JSON (statistics plus the full result)

mod csv;
mod json;
mod summary;
mod table;

pub use crate::csv::{export_raw_csv, generate_csv_summary, raw_file_name};
pub use json::{JsonReport, ReportMeta, SCHEMA_VERSION, generate_json_report};
pub use summary::{ClassSection, MeterSummary, StatisticsRow, summarize};
pub use table::{TableOptions, render_table};

use thiserror::Error;

/// Errors raised while writing reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable ASCII tables
    #[default]
    Table,
    /// JSON with statistics and raw samples
    Json,
    /// CSV statistics summary
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" | "human" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => f.write_str("table"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
        }
    }
}
