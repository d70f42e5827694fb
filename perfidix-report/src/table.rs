//! ASCII Table Output
//!
//! One fixed-width table per meter: a row per method, a summary row per class,
//! an overall row; then a list of every recorded failure.

use crate::summary::{MeterSummary, StatisticsRow, summarize};
use perfidix_core::{BenchmarkResult, ConfidenceLevels, Failure};
use std::fmt::Write;

/// Table rendering options
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    /// Digits after the decimal point
    pub decimals: usize,
    /// Levels of the two confidence columns
    pub confidence: ConfidenceLevels,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            confidence: ConfidenceLevels::default(),
        }
    }
}

enum Line {
    Cells(Vec<String>),
    Rule,
}

/// Render the result as ASCII tables
pub fn render_table(result: &BenchmarkResult, options: &TableOptions) -> String {
    let mut output = String::new();

    if result.meters.is_empty() || result.classes.is_empty() {
        output.push_str("No benchmark results.\n");
    }

    if !result.classes.is_empty() {
        for summary in summarize(result, &options.confidence) {
            render_meter(&mut output, &summary, options);
            output.push('\n');
        }
    }

    if let Some(seed) = result.seed {
        let _ = writeln!(output, "Arrangement: {} (seed {seed})", result.arrangement);
        output.push('\n');
    }

    render_failures(&mut output, &result.failures);
    output
}

fn render_meter(output: &mut String, summary: &MeterSummary, options: &TableOptions) {
    let [first, second] = options.confidence.levels();
    let header = [
        "Method".to_string(),
        "unit".to_string(),
        "sum".to_string(),
        "min".to_string(),
        "max".to_string(),
        "mean".to_string(),
        "stddev".to_string(),
        confidence_label(first),
        confidence_label(second),
        "runs".to_string(),
    ];

    let unit = &summary.meter.unit;
    let mut lines = vec![Line::Cells(header.to_vec()), Line::Rule];
    for class in &summary.classes {
        for method in &class.methods {
            lines.push(Line::Cells(cells(method, &method.label, unit, options.decimals)));
        }
        let label = format!("summary for {}", class.summary.label);
        lines.push(Line::Cells(cells(&class.summary, &label, unit, options.decimals)));
        lines.push(Line::Rule);
    }
    lines.push(Line::Cells(cells(
        &summary.overall,
        "summary for all",
        unit,
        options.decimals,
    )));

    let mut widths = vec![0; header.len()];
    for line in &lines {
        if let Line::Cells(cells) = line {
            for (width, cell) in widths.iter_mut().zip(cells) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }
    let rule: String = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");

    let _ = writeln!(
        output,
        "{} ({})",
        summary.meter.label(),
        summary.meter.unit_description
    );
    let _ = writeln!(output, "|{rule}|");
    for line in &lines {
        match line {
            Line::Rule => {
                let _ = writeln!(output, "|{rule}|");
            }
            Line::Cells(cells) => {
                output.push('|');
                for (idx, (cell, &width)) in cells.iter().zip(&widths).enumerate() {
                    if idx == 0 {
                        let _ = write!(output, " {cell:<width$} |");
                    } else {
                        let _ = write!(output, " {cell:>width$} |");
                    }
                }
                output.push('\n');
            }
        }
    }
    let _ = writeln!(output, "|{rule}|");
}

fn cells(row: &StatisticsRow, label: &str, unit: &str, decimals: usize) -> Vec<String> {
    let stats = &row.statistics;
    let num = |v: f64| format!("{v:.decimals$}");
    let interval = |idx: usize| {
        let ci = &stats.confidence[idx];
        format!("[{}, {}]", num(ci.lower), num(ci.upper))
    };

    vec![
        label.to_string(),
        unit.to_string(),
        num(stats.sum()),
        num(stats.min()),
        num(stats.max()),
        num(stats.mean()),
        num(stats.std_dev()),
        interval(0),
        interval(1),
        stats.count().to_string(),
    ]
}

fn confidence_label(level: f64) -> String {
    let percent = level * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("conf{percent:.0}")
    } else {
        format!("conf{percent}")
    }
}

fn render_failures(output: &mut String, failures: &[Failure]) {
    if failures.is_empty() {
        output.push_str("No failures.\n");
        return;
    }

    let _ = writeln!(output, "Failures ({})", failures.len());
    output.push_str(&"-".repeat(60));
    output.push('\n');
    for failure in failures {
        let _ = write!(output, "  {} [{}]", failure.method_id(), failure.role);
        if let Some(repetition) = failure.repetition {
            let _ = write!(output, " repetition {repetition}");
        }
        if failure.invoked != failure.method {
            let _ = write!(output, " in `{}`", failure.invoked);
        }
        let _ = writeln!(output, ": {}", failure.message);
    }
}
