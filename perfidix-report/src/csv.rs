//! CSV Output
//!
//! Two shapes: a statistics summary with one row per method and meter, and
//! the raw-data export with one file of unaggregated samples per method and
//! meter.

use crate::ReportError;
use crate::summary::summarize;
use perfidix_core::{BenchmarkResult, ConfidenceLevels, MeterInfo};
use std::fs;
use std::path::{Path, PathBuf};

/// Generate a CSV summary: one row per method, class and meter
pub fn generate_csv_summary(
    result: &BenchmarkResult,
    levels: &ConfidenceLevels,
) -> Result<String, ReportError> {
    let [first, second] = levels.levels();
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    writer.write_record([
        "meter".to_string(),
        "unit".to_string(),
        "scope".to_string(),
        "id".to_string(),
        "count".to_string(),
        "sum".to_string(),
        "min".to_string(),
        "max".to_string(),
        "mean".to_string(),
        "median".to_string(),
        "std_dev".to_string(),
        "cv_percent".to_string(),
        format!("conf_lower_{first}"),
        format!("conf_upper_{first}"),
        format!("conf_lower_{second}"),
        format!("conf_upper_{second}"),
    ])?;

    for summary in summarize(result, levels) {
        let rows = summary
            .classes
            .iter()
            .flat_map(|class| {
                class
                    .methods
                    .iter()
                    .map(|m| ("method", m))
                    .chain(std::iter::once(("class", &class.summary)))
            })
            .chain(std::iter::once(("all", &summary.overall)));

        for (scope, row) in rows {
            let stats = &row.statistics;
            writer.write_record([
                summary.meter.name.clone(),
                summary.meter.unit.clone(),
                scope.to_string(),
                row.label.clone(),
                stats.count().to_string(),
                stats.sum().to_string(),
                stats.min().to_string(),
                stats.max().to_string(),
                stats.mean().to_string(),
                stats.summary.median.to_string(),
                stats.std_dev().to_string(),
                stats.summary.coefficient_of_variation().to_string(),
                stats.confidence[0].lower.to_string(),
                stats.confidence[0].upper.to_string(),
                stats.confidence[1].lower.to_string(),
                stats.confidence[1].upper.to_string(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Encoding(e.to_string()))
}

/// Write the raw samples of every method and meter to `dir`.
///
/// Files are named `Class$method$meter.csv` and hold the samples as one
/// comma-delimited line in recording order. Returns the written paths.
pub fn export_raw_csv(result: &BenchmarkResult, dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for method in result.methods() {
        for (idx, meter) in result.meters.iter().enumerate() {
            let path = dir.join(raw_file_name(
                &method.class,
                &method.method,
                &meter_stem(meter, &result.meters),
            ));

            let mut writer = ::csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&path)?;
            let samples = method.samples(idx);
            if !samples.is_empty() {
                writer.write_record(samples.iter().map(f64::to_string))?;
            }
            writer.flush()?;
            written.push(path);
        }
    }

    Ok(written)
}

/// `Class$method$meter.csv`
pub fn raw_file_name(class: &str, method: &str, meter: &str) -> String {
    format!("{class}${method}${meter}.csv")
}

/// Meter part of a raw file name; the unit is appended when two meters share
/// a name
fn meter_stem(meter: &MeterInfo, all: &[MeterInfo]) -> String {
    if all.iter().filter(|m| m.name == meter.name).count() > 1 {
        format!("{}_{}", meter.name, meter.unit)
    } else {
        meter.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixture;
    use perfidix_core::MeterKind;

    fn read_samples(path: &Path) -> Vec<f64> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .flat_map(|r| {
                r.unwrap()
                    .iter()
                    .map(|v| v.parse::<f64>().unwrap())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_raw_export() {
        let dir = tempfile::tempdir().unwrap();
        let result = fixture();

        let paths = export_raw_csv(&result, dir.path()).unwrap();
        // 3 methods x 2 meters
        assert_eq!(paths.len(), 6);

        let count = dir.path().join("Numbers$count$Ticks.csv");
        assert!(paths.contains(&count));
        let expected: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(read_samples(&count), expected);

        let pair = dir.path().join("Other$pair$Time.csv");
        assert_eq!(read_samples(&pair), [0.5, 0.75]);
    }

    #[test]
    fn test_raw_export_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("raw").join("run-1");
        export_raw_csv(&fixture(), &nested).unwrap();
        assert!(nested.join("Numbers$pair$Ticks.csv").exists());
    }

    #[test]
    fn test_meter_stem_disambiguates() {
        let time = |unit: &str| MeterInfo {
            name: "Time".to_string(),
            unit: unit.to_string(),
            unit_description: String::new(),
            kind: MeterKind::Bracket,
        };
        let all = [time("ms"), time("ns")];
        assert_eq!(meter_stem(&all[1], &all), "Time_ns");
        assert_eq!(meter_stem(&all[0], &all[..1]), "Time");
    }

    #[test]
    fn test_summary_csv() {
        let csv = generate_csv_summary(&fixture(), &ConfidenceLevels::default()).unwrap();
        let mut reader = ::csv::Reader::from_reader(csv.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "meter");
        assert_eq!(&headers[11], "cv_percent");
        assert_eq!(&headers[12], "conf_lower_0.95");

        let rows: Vec<_> = reader.records().map(Result::unwrap).collect();
        // (3 methods + 2 classes + overall) x 2 meters
        assert_eq!(rows.len(), 12);
        assert_eq!(&rows[0][3], "Numbers::count");
        assert_eq!(&rows[0][5], "55");
        // std_dev / mean of 1..=10
        let cv: f64 = rows[0][11].parse().unwrap();
        assert!((cv - (55.0_f64 / 6.0).sqrt() / 5.5 * 100.0).abs() < 1e-9);
        assert_eq!(&rows[5][2], "all");
    }
}
