//! Perfidix Example Benchmarks
//!
//! Run with:
//!   cargo run --example benchmarks                                # Run everything
//!   cargo run --example benchmarks -- --help                      # Show all options
//!   cargo run --example benchmarks -- list                        # List benchmarks
//!   cargo run --example benchmarks -- Sorting --runs 20           # Filter and override runs
//!   cargo run --example benchmarks -- --arrangement shuffled --seed 7
//!   cargo run --example benchmarks -- --meter time:us --meter ticks:probes --format csv
//!
//! Watch a run from another terminal:
//!   cargo run --example benchmarks -- watch --once
//!   cargo run --example benchmarks -- --progress 127.0.0.1:7777

use perfidix::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

// ============================================================================
// Sorting: per-repetition setup
// ============================================================================

#[derive(Default)]
struct Sorting {
    data: Vec<u64>,
}

#[bench_class]
impl Sorting {
    /// Every repetition sorts the same reversed input
    #[before_each_run]
    fn fill(&mut self) {
        self.data = (0..10_000).rev().collect();
    }

    #[bench(runs = 50)]
    fn stable(&mut self) {
        self.data.sort();
    }

    #[bench(runs = 50)]
    fn unstable(&mut self) {
        self.data.sort_unstable();
    }

    #[after_each_run]
    fn verify(&mut self) -> Result<(), String> {
        if self.data.windows(2).all(|w| w[0] <= w[1]) {
            Ok(())
        } else {
            Err("data is not sorted".to_string())
        }
    }
}

// ============================================================================
// Maps: class-wide runs and a custom constructor
// ============================================================================

struct Maps {
    keys: Vec<u64>,
    probes: Ticker,
}

impl Maps {
    fn new() -> Self {
        Maps {
            keys: (0..1_000).map(|k| k * 7919 % 1_000_003).collect(),
            probes: Ticker::named("probes"),
        }
    }
}

#[bench_class(runs = 100, constructor = "Maps::new")]
impl Maps {
    fn hash_map(&self) {
        let map: HashMap<u64, u64> = self.keys.iter().map(|&k| (k, k)).collect();
        for k in &self.keys {
            black_box(map.get(k));
        }
        self.probes.tick_by(self.keys.len() as u64);
    }

    fn btree_map(&self) {
        let map: BTreeMap<u64, u64> = self.keys.iter().map(|&k| (k, k)).collect();
        for k in &self.keys {
            black_box(map.get(k));
        }
        self.probes.tick_by(self.keys.len() as u64);
    }

    /// Not a benchmark
    #[skip_bench]
    fn linear_scan(&self) {
        black_box(self.keys.iter().position(|&k| k == 42));
    }
}

// ============================================================================
// Parsing: one-time fixtures and a failing method
// ============================================================================

#[derive(Default)]
struct Parsing {
    document: String,
}

#[bench_class]
impl Parsing {
    #[before_bench_class]
    fn load(&mut self) {
        self.document = (0..2_000).map(|i| format!("{i},")).collect();
    }

    #[bench(runs = 200)]
    fn split(&self) {
        black_box(self.document.split(',').count());
    }

    #[bench(runs = 200)]
    fn parse_numbers(&self) -> Result<u64, std::num::ParseIntError> {
        self.document
            .split_terminator(',')
            .map(str::parse::<u64>)
            .sum()
    }

    /// Fails on purpose; the report lists the failure and the run goes on
    #[bench(runs = 3)]
    fn parse_garbage(&self) -> Result<u64, std::num::ParseIntError> {
        "not a number".parse()
    }
}

fn main() -> anyhow::Result<()> {
    perfidix::run()
}
