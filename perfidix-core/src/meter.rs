//! Meters
//!
//! A meter is an instrument polled by the engine around every benchmark
//! repetition. Bracket meters are read right before and right after the
//! benchmark body and contribute the difference; absolute meters contribute
//! the reading taken right after the body.

use crate::measure::{live_threads, read_cycles, resident_bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

/// Errors raised while reading or configuring a meter
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("{meter}: I/O error: {source}")]
    Io {
        meter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{meter}: reading went backwards ({before} -> {after})")]
    NegativeDelta {
        meter: String,
        before: f64,
        after: f64,
    },

    #[error("Invalid meter spec: {0}")]
    InvalidSpec(String),
}

/// How the engine turns readings into a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    /// Sample = reading after the body minus reading before it
    Bracket,
    /// Sample = reading after the body
    Absolute,
}

/// Descriptive part of a meter, stored in results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterInfo {
    /// Meter name, e.g. `Time`
    pub name: String,
    /// Short unit, e.g. `ms`
    pub unit: String,
    /// Long unit, e.g. `milliseconds`
    pub unit_description: String,
    /// Bracket or absolute
    pub kind: MeterKind,
}

impl MeterInfo {
    /// `Name [unit]`, unique enough to label a column or a file
    pub fn label(&self) -> String {
        format!("{} [{}]", self.name, self.unit)
    }
}

/// A pluggable instrument producing a numeric reading
pub trait Meter {
    /// Meter name
    fn name(&self) -> &str;
    /// Short unit
    fn unit(&self) -> &str;
    /// Long unit
    fn unit_description(&self) -> &str;
    /// Whether readings bracket the body or are taken after it
    fn kind(&self) -> MeterKind;
    /// Current reading
    fn value(&mut self) -> Result<f64, MeterError>;

    /// Snapshot of the descriptive fields
    fn info(&self) -> MeterInfo {
        MeterInfo {
            name: self.name().to_string(),
            unit: self.unit().to_string(),
            unit_description: self.unit_description().to_string(),
            kind: self.kind(),
        }
    }
}

// ─── Time ────────────────────────────────────────────────────────────────────

/// Time unit for [`TimeMeter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Time {
    /// ns
    Nanoseconds,
    /// us
    Microseconds,
    /// ms
    #[default]
    Milliseconds,
    /// s
    Seconds,
}

impl Time {
    fn nanos_per_unit(self) -> f64 {
        match self {
            Time::Nanoseconds => 1.0,
            Time::Microseconds => 1_000.0,
            Time::Milliseconds => 1_000_000.0,
            Time::Seconds => 1_000_000_000.0,
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Time::Nanoseconds => "ns",
            Time::Microseconds => "us",
            Time::Milliseconds => "ms",
            Time::Seconds => "s",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Time::Nanoseconds => "nanoseconds",
            Time::Microseconds => "microseconds",
            Time::Milliseconds => "milliseconds",
            Time::Seconds => "seconds",
        }
    }
}

impl FromStr for Time {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ns" => Ok(Time::Nanoseconds),
            "us" | "µs" => Ok(Time::Microseconds),
            "ms" => Ok(Time::Milliseconds),
            "s" => Ok(Time::Seconds),
            other => Err(MeterError::InvalidSpec(format!("unknown time unit: {other}"))),
        }
    }
}

/// Elapsed wall-clock time since the meter was created
#[derive(Debug)]
pub struct TimeMeter {
    origin: std::time::Instant,
    unit: Time,
}

impl TimeMeter {
    /// Create a time meter reporting in `unit`
    pub fn new(unit: Time) -> Self {
        Self {
            origin: std::time::Instant::now(),
            unit,
        }
    }
}

impl Default for TimeMeter {
    fn default() -> Self {
        Self::new(Time::default())
    }
}

impl Meter for TimeMeter {
    fn name(&self) -> &str {
        "Time"
    }

    fn unit(&self) -> &str {
        self.unit.unit()
    }

    fn unit_description(&self) -> &str {
        self.unit.description()
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Bracket
    }

    #[inline]
    fn value(&mut self) -> Result<f64, MeterError> {
        Ok(self.origin.elapsed().as_nanos() as f64 / self.unit.nanos_per_unit())
    }
}

// ─── Cycles ──────────────────────────────────────────────────────────────────

/// CPU cycle counter (always 0 on platforms without one)
#[derive(Debug, Default)]
pub struct CycleMeter;

impl Meter for CycleMeter {
    fn name(&self) -> &str {
        "Cycles"
    }

    fn unit(&self) -> &str {
        "cycles"
    }

    fn unit_description(&self) -> &str {
        "CPU cycles"
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Bracket
    }

    #[inline]
    fn value(&mut self) -> Result<f64, MeterError> {
        Ok(read_cycles() as f64)
    }
}

// ─── Memory ──────────────────────────────────────────────────────────────────

/// Memory unit for [`MemMeter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Memory {
    /// B
    Bytes,
    /// KiB
    #[default]
    KibiBytes,
    /// MiB
    MebiBytes,
}

impl Memory {
    fn bytes_per_unit(self) -> f64 {
        match self {
            Memory::Bytes => 1.0,
            Memory::KibiBytes => 1024.0,
            Memory::MebiBytes => 1024.0 * 1024.0,
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Memory::Bytes => "B",
            Memory::KibiBytes => "KiB",
            Memory::MebiBytes => "MiB",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Memory::Bytes => "bytes",
            Memory::KibiBytes => "kibibytes",
            Memory::MebiBytes => "mebibytes",
        }
    }
}

impl FromStr for Memory {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "b" => Ok(Memory::Bytes),
            "kib" | "kb" => Ok(Memory::KibiBytes),
            "mib" | "mb" => Ok(Memory::MebiBytes),
            other => Err(MeterError::InvalidSpec(format!(
                "unknown memory unit: {other}"
            ))),
        }
    }
}

/// Resident memory of the process after the body ran
#[derive(Debug, Default)]
pub struct MemMeter {
    unit: Memory,
}

impl MemMeter {
    /// Create a memory meter reporting in `unit`
    pub fn new(unit: Memory) -> Self {
        Self { unit }
    }
}

impl Meter for MemMeter {
    fn name(&self) -> &str {
        "Memory"
    }

    fn unit(&self) -> &str {
        self.unit.unit()
    }

    fn unit_description(&self) -> &str {
        self.unit.description()
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Absolute
    }

    fn value(&mut self) -> Result<f64, MeterError> {
        let bytes = resident_bytes().map_err(|source| MeterError::Io {
            meter: self.name().to_string(),
            source,
        })?;
        Ok(bytes as f64 / self.unit.bytes_per_unit())
    }
}

// ─── Threads ─────────────────────────────────────────────────────────────────

/// Number of live threads after the body ran
#[derive(Debug, Default)]
pub struct ThreadMeter;

impl Meter for ThreadMeter {
    fn name(&self) -> &str {
        "Threads"
    }

    fn unit(&self) -> &str {
        "threads"
    }

    fn unit_description(&self) -> &str {
        "live threads"
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Absolute
    }

    fn value(&mut self) -> Result<f64, MeterError> {
        live_threads()
            .map(|n| n as f64)
            .map_err(|source| MeterError::Io {
                meter: self.name().to_string(),
                source,
            })
    }
}

// ─── Ticks ───────────────────────────────────────────────────────────────────

/// Shared manual tick counter, ticked from benchmark code
#[derive(Debug, Clone, Default)]
pub struct Ticker {
    count: Arc<AtomicU64>,
}

static NAMED_TICKERS: OnceLock<Mutex<HashMap<String, Ticker>>> = OnceLock::new();

impl Ticker {
    /// A fresh, unnamed ticker
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide ticker registered under `name`.
    ///
    /// Benchmark bodies have no handle on the engine, so named tickers are
    /// how user code and a `ticks:<name>` meter find each other.
    pub fn named(name: &str) -> Self {
        let registry = NAMED_TICKERS.get_or_init(|| Mutex::new(HashMap::new()));
        let mut tickers = registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tickers.entry(name.to_string()).or_default().clone()
    }

    /// Add one tick
    #[inline]
    pub fn tick(&self) {
        self.tick_by(1);
    }

    /// Add `n` ticks
    #[inline]
    pub fn tick_by(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Ticks so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Counts manual ticks made during the body
#[derive(Debug)]
pub struct CountingMeter {
    name: String,
    ticker: Ticker,
}

impl CountingMeter {
    /// Meter over a private ticker; use [`CountingMeter::ticker`] to tick it
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_ticker(name, Ticker::new())
    }

    /// Meter over an existing ticker
    pub fn with_ticker(name: impl Into<String>, ticker: Ticker) -> Self {
        Self {
            name: name.into(),
            ticker,
        }
    }

    /// Handle for ticking this meter
    pub fn ticker(&self) -> Ticker {
        self.ticker.clone()
    }
}

impl Meter for CountingMeter {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &str {
        "ticks"
    }

    fn unit_description(&self) -> &str {
        "manual ticks"
    }

    fn kind(&self) -> MeterKind {
        MeterKind::Bracket
    }

    fn value(&mut self) -> Result<f64, MeterError> {
        Ok(self.ticker.count() as f64)
    }
}

// ─── Specs ───────────────────────────────────────────────────────────────────

/// Textual meter selection used by configuration and the command line.
///
/// Grammar: `time[:ns|us|ms|s]`, `cycles`, `mem[:b|kib|mib]`, `threads`,
/// `ticks:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterSpec {
    /// [`TimeMeter`]
    Time(Time),
    /// [`CycleMeter`]
    Cycles,
    /// [`MemMeter`]
    Memory(Memory),
    /// [`ThreadMeter`]
    Threads,
    /// [`CountingMeter`] over the named ticker
    Ticks(String),
}

impl MeterSpec {
    /// Instantiate the meter
    pub fn build(&self) -> Box<dyn Meter> {
        match self {
            MeterSpec::Time(unit) => Box::new(TimeMeter::new(*unit)),
            MeterSpec::Cycles => Box::new(CycleMeter),
            MeterSpec::Memory(unit) => Box::new(MemMeter::new(*unit)),
            MeterSpec::Threads => Box::new(ThreadMeter),
            MeterSpec::Ticks(name) => {
                Box::new(CountingMeter::with_ticker(name.clone(), Ticker::named(name)))
            }
        }
    }
}

impl Default for MeterSpec {
    fn default() -> Self {
        MeterSpec::Time(Time::default())
    }
}

impl FromStr for MeterSpec {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg.trim())),
            None => (s, None),
        };

        match (kind.to_lowercase().as_str(), arg) {
            ("time", None) => Ok(MeterSpec::Time(Time::default())),
            ("time", Some(unit)) => Ok(MeterSpec::Time(unit.parse()?)),
            ("cycles", None) => Ok(MeterSpec::Cycles),
            ("mem" | "memory", None) => Ok(MeterSpec::Memory(Memory::default())),
            ("mem" | "memory", Some(unit)) => Ok(MeterSpec::Memory(unit.parse()?)),
            ("threads", None) => Ok(MeterSpec::Threads),
            ("ticks", Some(name)) if !name.is_empty() => Ok(MeterSpec::Ticks(name.to_string())),
            _ => Err(MeterError::InvalidSpec(s.to_string())),
        }
    }
}

impl fmt::Display for MeterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterSpec::Time(unit) => write!(f, "time:{}", unit.unit()),
            MeterSpec::Cycles => f.write_str("cycles"),
            MeterSpec::Memory(unit) => write!(f, "mem:{}", unit.unit().to_lowercase()),
            MeterSpec::Threads => f.write_str("threads"),
            MeterSpec::Ticks(name) => write!(f, "ticks:{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_time_meter_bracket() {
        let mut meter = TimeMeter::new(Time::Milliseconds);
        let before = meter.value().unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let after = meter.value().unwrap();

        assert!(after - before >= 5.0);
        assert_eq!(meter.kind(), MeterKind::Bracket);
        assert_eq!(meter.unit(), "ms");
    }

    #[test]
    fn test_counting_meter() {
        let mut meter = CountingMeter::new("ops");
        let ticker = meter.ticker();
        let before = meter.value().unwrap();
        ticker.tick();
        ticker.tick_by(4);
        assert_eq!(meter.value().unwrap() - before, 5.0);
        assert_eq!(meter.name(), "ops");
    }

    #[test]
    fn test_named_ticker_is_shared() {
        let a = Ticker::named("meter-tests-shared");
        let b = Ticker::named("meter-tests-shared");
        let start = b.count();
        a.tick_by(3);
        assert_eq!(b.count() - start, 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_absolute_meters() {
        let mut mem = MemMeter::new(Memory::Bytes);
        assert_eq!(mem.kind(), MeterKind::Absolute);
        assert!(mem.value().unwrap() > 0.0);

        let mut threads = ThreadMeter;
        assert!(threads.value().unwrap() >= 1.0);
    }

    #[test]
    fn test_parse_specs() {
        assert_eq!("time".parse::<MeterSpec>().unwrap(), MeterSpec::Time(Time::Milliseconds));
        assert_eq!("time:ns".parse::<MeterSpec>().unwrap(), MeterSpec::Time(Time::Nanoseconds));
        assert_eq!("cycles".parse::<MeterSpec>().unwrap(), MeterSpec::Cycles);
        assert_eq!("mem:mib".parse::<MeterSpec>().unwrap(), MeterSpec::Memory(Memory::MebiBytes));
        assert_eq!("threads".parse::<MeterSpec>().unwrap(), MeterSpec::Threads);
        assert_eq!(
            "ticks:inserts".parse::<MeterSpec>().unwrap(),
            MeterSpec::Ticks("inserts".to_string())
        );
    }

    #[test]
    fn test_parse_invalid_specs() {
        assert!("ticks".parse::<MeterSpec>().is_err());
        assert!("ticks:".parse::<MeterSpec>().is_err());
        assert!("time:fortnights".parse::<MeterSpec>().is_err());
        assert!("voltage".parse::<MeterSpec>().is_err());
    }

    #[test]
    fn test_spec_display_parses_back() {
        for spec in [
            MeterSpec::Time(Time::Microseconds),
            MeterSpec::Memory(Memory::KibiBytes),
            MeterSpec::Ticks("x".to_string()),
        ] {
            assert_eq!(spec.to_string().parse::<MeterSpec>().unwrap(), spec);
        }
    }

    #[test]
    fn test_info_label() {
        let meter = TimeMeter::new(Time::Seconds);
        let info = meter.info();
        assert_eq!(info.label(), "Time [s]");
        assert_eq!(info.unit_description, "seconds");
    }
}
