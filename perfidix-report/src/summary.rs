//! Statistics Summary
//!
//! Per-meter statistics at every aggregation level, computed in parallel
//! across meters. Table, CSV and JSON output all render from this.

use perfidix_core::{Aggregate, BenchmarkResult, ConfidenceLevels, MeterInfo, MeterStatistics};
use rayon::prelude::*;
use serde::Serialize;

/// Statistics of one node of the result tree for one meter
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsRow {
    /// `Class::method`, the class name, or `all`
    pub label: String,
    /// Statistics over the node's raw samples
    pub statistics: MeterStatistics,
}

/// One class with its methods
#[derive(Debug, Clone, Serialize)]
pub struct ClassSection {
    /// Rows of the class's methods, in execution order
    pub methods: Vec<StatisticsRow>,
    /// Union of the class's samples
    pub summary: StatisticsRow,
}

/// Everything reported for one meter
#[derive(Debug, Clone, Serialize)]
pub struct MeterSummary {
    /// The meter
    pub meter: MeterInfo,
    /// Classes in execution order
    pub classes: Vec<ClassSection>,
    /// Union of all samples
    pub overall: StatisticsRow,
}

/// Compute the statistics of every meter
pub fn summarize(result: &BenchmarkResult, levels: &ConfidenceLevels) -> Vec<MeterSummary> {
    (0..result.meters.len())
        .into_par_iter()
        .map(|meter| MeterSummary {
            meter: result.meters[meter].clone(),
            classes: result
                .classes
                .iter()
                .map(|class| ClassSection {
                    methods: class
                        .methods
                        .iter()
                        .map(|m| StatisticsRow {
                            label: m.id(),
                            statistics: m.statistics(meter, levels),
                        })
                        .collect(),
                    summary: StatisticsRow {
                        label: class.name.clone(),
                        statistics: class.statistics(meter, levels),
                    },
                })
                .collect(),
            overall: StatisticsRow {
                label: "all".to_string(),
                statistics: result.statistics(meter, levels),
            },
        })
        .collect()
}
