#![warn(missing_docs)]
//! # Perfidix
//!
//! Benchmark classes with lifecycle hooks, pluggable meters and statistical
//! reports.
//!
//! - **Benchmark classes**: an `impl` block marked `#[bench_class]`; one
//!   shared instance per class, with class, method and repetition hooks
//! - **Meters**: wall-clock time, CPU cycles, resident memory, thread count
//!   and manual tick counters, read around every repetition
//! - **Failure isolation**: panics and returned errors are recorded per
//!   phase and repetition; the rest of the run carries on
//! - **Arrangement**: declaration order, or a seeded shuffle
//! - **Reports**: ASCII tables with confidence intervals, CSV, JSON and raw
//!   sample export
//! - **Progress forwarding**: live events over TCP to `perfidix watch`
//!
//! ## Quick Start
//!
//! ```ignore
//! use perfidix::prelude::*;
//!
//! #[derive(Default)]
//! struct Sorting {
//!     data: Vec<u64>,
//! }
//!
//! #[bench_class]
//! impl Sorting {
//!     #[before_each_run]
//!     fn fill(&mut self) {
//!         self.data = (0..10_000).rev().collect();
//!     }
//!
//!     #[bench(runs = 100)]
//!     fn sort(&mut self) {
//!         self.data.sort();
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     perfidix::run()
//! }
//! ```
//!
//! ## Embedding
//!
//! ```ignore
//! let mut engine = Engine::new(EngineConfig {
//!     meters: vec!["time:us".parse()?, MeterSpec::Threads],
//!     ..EngineConfig::default()
//! })?;
//! let result = engine.run_registered();
//! println!("{}", render_table(&result, &TableOptions::default()));
//! ```

// Re-export core types
pub use perfidix_core::{
    Aggregate, Arrangement, BenchListener, BenchmarkResult, ClassDef, ClassResult,
    ConfidenceInterval, ConfidenceLevels, CountingMeter, CycleMeter, Engine, EngineConfig,
    EngineError, EngineState, Failure, FailureKind, ListenerError, MemMeter, Memory, Meter,
    MeterError, MeterInfo, MeterKind, MeterSpec, MeterStatistics, MethodResult, NullListener,
    PlanFilter, PlannedRuns, Role, ThreadMeter, Ticker, Time, TimeMeter, registered_class,
    registered_classes,
};

// Re-export macros
pub use perfidix_macros::bench_class;

// Re-export output sinks
pub use perfidix_report::{
    OutputFormat, ReportError, TableOptions, export_raw_csv, generate_csv_summary,
    generate_json_report, render_table,
};

// Re-export the progress stream
pub use perfidix_cli::{ProgressBarListener, SocketProgressListener};
pub use perfidix_ipc::{ProgressEvent, ProgressReceiver, ProgressSender, ReceiverExit, RunTotal};

/// Internal re-exports for macro use
#[doc(hidden)]
pub mod internal {
    pub use inventory;
    pub use perfidix_core::{
        Annotation, BenchAttr, ClassDef, MethodDef, MethodOutcome, Receiver, wrong_instance,
    };
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BenchmarkResult, Engine, EngineConfig, MeterSpec, TableOptions, Ticker, bench_class,
        render_table,
    };
}

/// Run the Perfidix CLI harness.
///
/// Call this from your benchmark binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     perfidix::run()
/// }
/// ```
pub use perfidix_cli::run;
