//! Configuration loading from perfidix.toml
//!
//! The file is discovered by walking up from the current directory. Every
//! section and key is optional; command-line flags override file values.

use perfidix_core::{
    Arrangement, ConfidenceError, ConfidenceLevels, DEFAULT_RUNS, MeterError, MeterSpec,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up by [`PerfidixConfig::discover`]
pub const CONFIG_FILE: &str = "perfidix.toml";

/// Errors raised while loading or interpreting a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Meter(#[from] MeterError),

    #[error(transparent)]
    Confidence(#[from] ConfidenceError),
}

/// Perfidix configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerfidixConfig {
    /// Engine settings
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Statistics settings
    #[serde(default)]
    pub statistics: StatisticsConfig,
    /// Report settings
    #[serde(default)]
    pub output: OutputConfig,
    /// Progress forwarding
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Repetitions for methods without an explicit count
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// `sequential` or `shuffled`
    #[serde(default)]
    pub arrangement: Arrangement,
    /// Shuffle seed; random when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Meter specs, e.g. `time:ms`, `cycles`, `mem:kib`
    #[serde(default = "default_meters")]
    pub meters: Vec<String>,
    /// Pin the benchmark thread to this CPU
    #[serde(default)]
    pub pin_cpu: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            arrangement: Arrangement::default(),
            seed: None,
            meters: default_meters(),
            pin_cpu: None,
        }
    }
}

fn default_runs() -> u32 {
    DEFAULT_RUNS
}
fn default_meters() -> Vec<String> {
    vec!["time:ms".to_string()]
}

/// Statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// The two confidence levels reported per mean
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: [f64; 2],
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            confidence_levels: default_confidence_levels(),
        }
    }
}

fn default_confidence_levels() -> [f64; 2] {
    ConfidenceLevels::default().levels()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: table, json, csv
    #[serde(default = "default_format")]
    pub format: String,
    /// Directory for raw-data CSV files
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Digits after the decimal point in tables
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    /// Export raw samples per method and meter
    #[serde(default)]
    pub raw_data: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            directory: default_directory(),
            decimals: default_decimals(),
            raw_data: false,
        }
    }
}

fn default_format() -> String {
    "table".to_string()
}
fn default_directory() -> PathBuf {
    PathBuf::from("target/perfidix")
}
fn default_decimals() -> usize {
    2
}

/// Progress forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgressConfig {
    /// Address of a progress receiver, e.g. `127.0.0.1:7777`
    #[serde(default)]
    pub address: Option<String>,
}

impl PerfidixConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Find and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring configuration");
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Parsed meter specs
    pub fn meter_specs(&self) -> Result<Vec<MeterSpec>, ConfigError> {
        self.runner
            .meters
            .iter()
            .map(|spec| spec.parse().map_err(ConfigError::from))
            .collect()
    }

    /// Validated confidence levels
    pub fn confidence_levels(&self) -> Result<ConfidenceLevels, ConfigError> {
        let [first, second] = self.statistics.confidence_levels;
        Ok(ConfidenceLevels::new(first, second)?)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Perfidix Configuration

[runner]
# Repetitions for benchmarks without an explicit count
runs = 1000
# Method order: "sequential" or "shuffled"
arrangement = "sequential"
# Shuffle seed (uncomment for a reproducible order)
# seed = 42
# Meters: time[:ns|us|ms|s], cycles, mem[:b|kib|mib], threads, ticks:<name>
meters = ["time:ms"]
# Pin the benchmark thread to a CPU (uncomment to enable)
# pin_cpu = 0

[statistics]
# Two confidence levels reported for every mean
confidence_levels = [0.95, 0.99]

[output]
# Default output format: table, json, csv
format = "table"
# Directory for raw sample files
directory = "target/perfidix"
# Digits after the decimal point in tables
decimals = 2
# Write one CSV file of raw samples per method and meter
raw_data = false

[progress]
# Forward progress events to a receiver (uncomment to enable)
# address = "127.0.0.1:7777"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perfidix_core::Time;

    #[test]
    fn test_default_config() {
        let config = PerfidixConfig::default();
        assert_eq!(config.runner.runs, DEFAULT_RUNS);
        assert_eq!(config.runner.arrangement, Arrangement::Sequential);
        assert_eq!(config.output.decimals, 2);
        assert!(!config.output.raw_data);
        assert!(config.progress.address.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            runs = 25
            arrangement = "shuffled"
            seed = 7
            meters = ["time:us", "threads"]

            [statistics]
            confidence_levels = [0.9, 0.95]
        "#;

        let config: PerfidixConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.runs, 25);
        assert_eq!(config.runner.arrangement, Arrangement::Shuffled);
        assert_eq!(config.runner.seed, Some(7));
        assert_eq!(
            config.meter_specs().unwrap(),
            [MeterSpec::Time(Time::Microseconds), MeterSpec::Threads]
        );
        assert_eq!(config.confidence_levels().unwrap().levels(), [0.9, 0.95]);
        // Defaults should still apply
        assert_eq!(config.output.format, "table");
    }

    #[test]
    fn test_invalid_values() {
        let config: PerfidixConfig = toml::from_str(
            r#"
            [runner]
            meters = ["sundial"]

            [statistics]
            confidence_levels = [0.95, 1.5]
        "#,
        )
        .unwrap();
        assert!(matches!(config.meter_specs(), Err(ConfigError::Meter(_))));
        assert!(matches!(
            config.confidence_levels(),
            Err(ConfigError::Confidence(_))
        ));

        assert!(toml::from_str::<PerfidixConfig>("[runner]\narrangement = \"random\"").is_err());
    }

    #[test]
    fn test_default_toml_parses() {
        let config: PerfidixConfig = toml::from_str(&PerfidixConfig::default_toml()).unwrap();
        assert_eq!(config.runner.runs, DEFAULT_RUNS);
        assert_eq!(config.statistics.confidence_levels, [0.95, 0.99]);
        assert_eq!(config.output.directory, PathBuf::from("target/perfidix"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[output]\ndecimals = 4\n").unwrap();
        let config = PerfidixConfig::load(&path).unwrap();
        assert_eq!(config.output.decimals, 4);

        assert!(matches!(
            PerfidixConfig::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
