//! Result Model
//!
//! Three-level aggregation tree: [`BenchmarkResult`] → [`ClassResult`] →
//! [`MethodResult`] → one raw sample series per meter. Samples are only ever
//! appended; every statistic is derived on demand from the raw series, so
//! reading statistics twice gives the same numbers.
//!
//! Class and benchmark statistics are computed over the union of the
//! underlying raw samples, never by averaging averages.

use crate::arrangement::Arrangement;
use crate::element::Role;
use crate::invoker::{FailureKind, InvocationError};
use crate::meter::MeterInfo;
use perfidix_stats::{
    ConfidenceInterval, ConfidenceLevels, SummaryStatistics, compute_summary,
    confidence_interval,
};
use serde::{Deserialize, Serialize};

/// A failure recorded during any phase of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    /// Class the failure belongs to
    pub class: String,
    /// Benchmark method the failure is attributed to; for class-level hooks,
    /// the hook itself
    pub method: String,
    /// Method that actually failed (a hook, the body, or the constructor)
    pub invoked: String,
    /// Phase the failure happened in
    pub role: Role,
    /// 1-based repetition, for failures inside the run loop
    pub repetition: Option<u32>,
    /// Returned error or panic; `None` for classification and meter failures
    pub kind: Option<FailureKind>,
    /// Human-readable description
    pub message: String,
}

impl Failure {
    /// Build a failure from a failed invocation
    pub fn from_invocation(
        class: &str,
        method: &str,
        error: &InvocationError,
        repetition: Option<u32>,
    ) -> Self {
        Self {
            class: class.to_string(),
            method: method.to_string(),
            invoked: error.method.clone(),
            role: error.role,
            repetition,
            kind: Some(error.kind),
            message: error.message.clone(),
        }
    }

    /// A method that could not be classified
    pub fn classification(class: &str, method: &str, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            method: method.to_string(),
            invoked: method.to_string(),
            role: Role::Classification,
            repetition: None,
            kind: None,
            message: message.into(),
        }
    }

    /// A meter that could not be read during a repetition
    pub fn meter(class: &str, method: &str, repetition: u32, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            method: method.to_string(),
            invoked: method.to_string(),
            role: Role::Meter,
            repetition: Some(repetition),
            kind: None,
            message: message.into(),
        }
    }

    /// `Class::method` of the attributed method
    pub fn method_id(&self) -> String {
        format!("{}::{}", self.class, self.method)
    }
}

/// Statistics of one meter at one aggregation level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterStatistics {
    /// Count, sum, min, max, mean, variance, standard deviation, median
    pub summary: SummaryStatistics,
    /// Confidence intervals of the mean at the two configured levels
    pub confidence: [ConfidenceInterval; 2],
}

impl MeterStatistics {
    /// Statistics of a raw series
    pub fn from_samples(samples: &[f64], levels: &ConfidenceLevels) -> Self {
        let summary = compute_summary(samples);
        let [first, second] = levels.levels();
        Self {
            summary,
            confidence: [
                confidence_interval(&summary, first),
                confidence_interval(&summary, second),
            ],
        }
    }

    /// Number of samples
    pub fn count(&self) -> usize {
        self.summary.count
    }

    /// Sum of samples
    pub fn sum(&self) -> f64 {
        self.summary.sum
    }

    /// Smallest sample
    pub fn min(&self) -> f64 {
        self.summary.min
    }

    /// Largest sample
    pub fn max(&self) -> f64 {
        self.summary.max
    }

    /// Mean of samples
    pub fn mean(&self) -> f64 {
        self.summary.mean
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        self.summary.variance
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> f64 {
        self.summary.std_dev
    }
}

/// Anything that can hand out the raw samples of a meter
pub trait Aggregate {
    /// All raw samples of `meter` below this node, in recording order
    fn collect_samples(&self, meter: usize) -> Vec<f64>;

    /// Statistics of `meter` over all raw samples below this node
    fn statistics(&self, meter: usize, levels: &ConfidenceLevels) -> MeterStatistics {
        MeterStatistics::from_samples(&self.collect_samples(meter), levels)
    }
}

/// All samples of one benchmark method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    /// Owning class
    pub class: String,
    /// Method name
    pub method: String,
    /// Repetitions the method was scheduled for
    pub runs_planned: u32,
    /// One series per meter, indexed like [`BenchmarkResult::meters`]
    samples: Vec<Vec<f64>>,
}

impl MethodResult {
    /// Empty result for a method measured by `meter_count` meters
    pub fn new(
        class: impl Into<String>,
        method: impl Into<String>,
        runs_planned: u32,
        meter_count: usize,
    ) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
            runs_planned,
            samples: vec![Vec::with_capacity(runs_planned as usize); meter_count],
        }
    }

    /// `Class::method`
    pub fn id(&self) -> String {
        format!("{}::{}", self.class, self.method)
    }

    /// Append the samples of one successful repetition, one value per meter
    pub fn push_run(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.samples.len());
        for (series, value) in self.samples.iter_mut().zip(values) {
            series.push(*value);
        }
    }

    /// Raw samples of a meter; empty for an unknown meter index
    pub fn samples(&self, meter: usize) -> &[f64] {
        self.samples.get(meter).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of repetitions that produced samples
    pub fn successful_runs(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }
}

impl Aggregate for MethodResult {
    fn collect_samples(&self, meter: usize) -> Vec<f64> {
        self.samples(meter).to_vec()
    }
}

/// All methods of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassResult {
    /// Class name
    pub name: String,
    /// Methods in execution order
    pub methods: Vec<MethodResult>,
}

impl ClassResult {
    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&MethodResult> {
        self.methods.iter().find(|m| m.method == name)
    }
}

impl Aggregate for ClassResult {
    fn collect_samples(&self, meter: usize) -> Vec<f64> {
        self.methods
            .iter()
            .flat_map(|m| m.samples(meter).iter().copied())
            .collect()
    }
}

/// Root of the result tree for one full run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Meters in the order their series are stored
    pub meters: Vec<MeterInfo>,
    /// Classes in the order they were first executed
    pub classes: Vec<ClassResult>,
    /// Every failure of the run, in the order it was recorded
    pub failures: Vec<Failure>,
    /// Arrangement used to order methods
    pub arrangement: Arrangement,
    /// Seed used when the arrangement was shuffled
    pub seed: Option<u64>,
}

impl BenchmarkResult {
    /// Empty result for the given meters
    pub fn new(meters: Vec<MeterInfo>) -> Self {
        Self {
            meters,
            classes: Vec::new(),
            failures: Vec::new(),
            arrangement: Arrangement::default(),
            seed: None,
        }
    }

    /// Result node of a method, created (empty) on first use
    pub fn method_entry(&mut self, class: &str, method: &str, runs_planned: u32) -> &mut MethodResult {
        let meter_count = self.meters.len();

        let class_idx = match self.classes.iter().position(|c| c.name == class) {
            Some(idx) => idx,
            None => {
                self.classes.push(ClassResult {
                    name: class.to_string(),
                    methods: Vec::new(),
                });
                self.classes.len() - 1
            }
        };

        let methods = &mut self.classes[class_idx].methods;
        let method_idx = match methods.iter().position(|m| m.method == method) {
            Some(idx) => idx,
            None => {
                methods.push(MethodResult::new(class, method, runs_planned, meter_count));
                methods.len() - 1
            }
        };

        &mut methods[method_idx]
    }

    /// Record a failure
    pub fn push_failure(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    /// Look up a class by name
    pub fn class(&self, name: &str) -> Option<&ClassResult> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Look up a method by class and method name
    pub fn method(&self, class: &str, method: &str) -> Option<&MethodResult> {
        self.class(class).and_then(|c| c.method(method))
    }

    /// Index of the first meter with the given name
    pub fn meter_index(&self, name: &str) -> Option<usize> {
        self.meters.iter().position(|m| m.name == name)
    }

    /// Failures attributed to one method
    pub fn failures_for<'a>(
        &'a self,
        class: &'a str,
        method: &'a str,
    ) -> impl Iterator<Item = &'a Failure> + 'a {
        self.failures
            .iter()
            .filter(move |f| f.class == class && f.method == method)
    }

    /// Iterate all methods across classes
    pub fn methods(&self) -> impl Iterator<Item = &MethodResult> {
        self.classes.iter().flat_map(|c| c.methods.iter())
    }

    /// Total number of recorded samples over all meters
    pub fn total_samples(&self) -> usize {
        self.methods()
            .map(|m| (0..self.meters.len()).map(|i| m.samples(i).len()).sum::<usize>())
            .sum()
    }
}

impl Aggregate for BenchmarkResult {
    fn collect_samples(&self, meter: usize) -> Vec<f64> {
        self.classes
            .iter()
            .flat_map(|c| c.collect_samples(meter))
            .collect()
    }
}
