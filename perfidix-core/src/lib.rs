#![warn(missing_docs)]
//! Perfidix Core - Benchmark Engine
//!
//! This crate runs benchmark classes and collects their raw measurements:
//! - Element model and the `#[bench_class]` registry
//! - Method classification (benchmark methods, hooks, run counts)
//! - Lifecycle invocation with panic capture
//! - Sequential and seeded shuffled arrangement
//! - Pluggable meters (time, cycles, memory, threads, manual ticks)
//! - Append-only result tree with on-demand statistics
//! - Listener callbacks for progress reporting

mod arrangement;
mod classifier;
mod element;
mod engine;
mod invoker;
mod listener;
mod measure;
mod meter;
mod result;

pub use arrangement::{Arrangement, PlanFilter, Schedule, Scheduled, arrange};
pub use classifier::{
    BenchmarkMethod, ClassPlan, ClassifyConfig, DEFAULT_RUNS, Hook, classify,
};
pub use element::{
    Annotation, BenchAttr, ClassDef, ConstructorFn, MethodDef, MethodFn, MethodOutcome,
    Receiver, Role, registered_class, registered_classes, wrong_instance,
};
pub use engine::{Engine, EngineConfig, EngineError, EngineState};
pub use invoker::{FailureKind, InvocationError, instantiate, invoke};
pub use listener::{BenchListener, ListenerError, NullListener, PlannedRuns};
/// Whether this platform provides hardware cycle counters (x86_64 RDTSCP or AArch64 CNTVCT_EL0).
/// When `false`, [`CycleMeter`] always reads 0.
pub use measure::HAS_CYCLE_COUNTER;
pub use measure::pin_to_cpu;
pub use meter::{
    CountingMeter, CycleMeter, MemMeter, Memory, Meter, MeterError, MeterInfo, MeterKind,
    MeterSpec, ThreadMeter, Ticker, Time, TimeMeter,
};
pub use result::{
    Aggregate, BenchmarkResult, ClassResult, Failure, MeterStatistics, MethodResult,
};

/// Re-exported so reports and sinks share one statistics vocabulary
pub use perfidix_stats::{
    ConfidenceError, ConfidenceInterval, ConfidenceLevels, SummaryStatistics,
};
