//! Listener sinks
//!
//! Listeners observe a run while it happens: the plan up front, every
//! completed repetition, every failure, and the final result. A listener
//! error is logged by the engine and never aborts the run.

use crate::result::{BenchmarkResult, Failure};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a listener
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Planned repetitions of one method, announced before the run starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedRuns {
    /// `Class::method`
    pub method: String,
    /// Repetitions scheduled for the method
    pub runs: u32,
}

/// Observer of an engine run
///
/// All callbacks default to no-ops.
pub trait BenchListener {
    /// The run is about to start with the given plan
    fn init(&mut self, _plan: &[PlannedRuns]) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A repetition finished and its samples were committed
    fn run_completed(
        &mut self,
        _method: &str,
        _repetition: u32,
        _samples: &[f64],
    ) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A failure was recorded
    fn failure(&mut self, _failure: &Failure) -> Result<(), ListenerError> {
        Ok(())
    }

    /// A scheduled method will not run at all
    fn skipped(&mut self, _method: &str, _reason: &str) -> Result<(), ListenerError> {
        Ok(())
    }

    /// The run is over
    fn finished(&mut self, _result: &BenchmarkResult) -> Result<(), ListenerError> {
        Ok(())
    }
}

/// Listener that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl BenchListener for NullListener {}
