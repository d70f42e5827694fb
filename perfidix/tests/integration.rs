//! Integration tests for Perfidix
//!
//! Classes are declared with `#[bench_class]` and driven through the engine,
//! then through the report sinks.

use perfidix::{
    Aggregate, Arrangement, BenchmarkResult, ConfidenceLevels, Engine, EngineConfig, FailureKind,
    MeterSpec, PlanFilter, ProgressEvent, ProgressReceiver, ProgressSender, ReceiverExit, Role,
    RunTotal, SocketProgressListener, TableOptions, Ticker, bench_class, export_raw_csv,
    generate_json_report, registered_class, render_table,
};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

fn run_class(name: &str, config: EngineConfig) -> BenchmarkResult {
    let class = registered_class(name).unwrap();
    let mut engine = Engine::new(config).unwrap();
    engine.run(&[class])
}

fn ticks(name: &str) -> EngineConfig {
    EngineConfig {
        meters: vec![MeterSpec::Ticks(name.to_string())],
        ..EngineConfig::default()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

static LIFECYCLE_LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn log(event: &'static str) {
    LIFECYCLE_LOG.lock().unwrap().push(event);
}

#[derive(Default)]
struct Lifecycle {
    counter: u32,
}

#[bench_class]
impl Lifecycle {
    #[before_bench_class]
    fn open(&mut self) {
        log("open");
    }

    #[before_first_run]
    fn warm(&mut self) {
        log("warm");
    }

    #[before_each_run]
    fn reset(&mut self) {
        log("reset");
    }

    #[bench(runs = 3)]
    fn work(&mut self) {
        self.counter += 1;
        Ticker::named("lifecycle").tick_by(u64::from(self.counter));
        log("work");
    }

    #[after_each_run]
    fn check(&mut self) {
        log("check");
    }

    #[after_last_run]
    fn cool(&mut self) {
        log("cool");
    }

    #[after_bench_class]
    fn close(&mut self) {
        log("close");
    }

    fn helper(&self) -> usize {
        self.counter as usize
    }
}

#[test]
fn test_lifecycle_order() {
    let result = run_class("Lifecycle", ticks("lifecycle"));

    let log = LIFECYCLE_LOG.lock().unwrap().clone();
    assert_eq!(
        log,
        [
            "open", "warm", "reset", "work", "check", "reset", "work", "check", "reset", "work",
            "check", "cool", "close",
        ]
    );

    // One sample per repetition; the shared instance keeps its state
    let method = result.method("Lifecycle", "work").unwrap();
    assert_eq!(method.samples(0), [1.0, 2.0, 3.0]);
    assert!(result.failures.is_empty());
    assert!(result.method("Lifecycle", "helper").is_none());
    assert_eq!(Lifecycle { counter: 2 }.helper(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[derive(Default)]
struct Flaky {
    calls: u32,
}

#[bench_class]
impl Flaky {
    #[bench(runs = 4)]
    fn sometimes(&mut self) -> Result<(), String> {
        self.calls += 1;
        Ticker::named("flaky").tick();
        if self.calls == 2 {
            Err("second call fails".to_string())
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_failing_repetition_is_dropped() {
    let result = run_class("Flaky", ticks("flaky"));

    let method = result.method("Flaky", "sometimes").unwrap();
    assert_eq!(method.runs_planned, 4);
    assert_eq!(method.successful_runs(), 3);
    assert_eq!(method.samples(0), [1.0, 1.0, 1.0]);

    assert_eq!(result.failures.len(), 1);
    let failure = &result.failures[0];
    assert_eq!(failure.role, Role::Bench);
    assert_eq!(failure.repetition, Some(2));
    assert_eq!(failure.kind, Some(FailureKind::Returned));
    assert!(failure.message.contains("second call fails"));
}

#[derive(Default)]
struct BrokenSetup;

#[bench_class]
impl BrokenSetup {
    #[bench(runs = 5, before_first_run = "prepare")]
    fn body(&self) {}

    fn prepare(&mut self) {
        panic!("no fixture");
    }
}

#[test]
fn test_panicking_setup_yields_no_samples() {
    let result = run_class("BrokenSetup", EngineConfig::default());

    let method = result.method("BrokenSetup", "body").unwrap();
    assert_eq!(method.successful_runs(), 0);

    let failures: Vec<_> = result.failures_for("BrokenSetup", "body").collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].role, Role::BeforeFirstRun);
    assert_eq!(failures[0].invoked, "prepare");
    assert_eq!(failures[0].kind, Some(FailureKind::Panicked));
    assert!(failures[0].message.contains("no fixture"));
}

#[derive(Default)]
struct Misdeclared;

#[bench_class]
impl Misdeclared {
    #[bench]
    fn needs_input(&self, _n: usize) {}

    #[bench(after_each_run = "nowhere")]
    fn dangling(&self) {}

    #[bench(runs = 2)]
    fn fine(&self) {}
}

#[test]
fn test_invalid_methods_are_reported_not_run() {
    let result = run_class("Misdeclared", EngineConfig::default());

    assert_eq!(result.method("Misdeclared", "fine").unwrap().successful_runs(), 2);
    assert!(result.method("Misdeclared", "needs_input").is_none());

    let roles: Vec<_> = result
        .failures
        .iter()
        .map(|f| (f.method.as_str(), f.role))
        .collect();
    assert!(roles.contains(&("needs_input", Role::Classification)));
    assert!(roles.contains(&("dangling", Role::Classification)));
}

// ============================================================================
// Class options
// ============================================================================

struct Counting {
    base: u64,
}

impl Counting {
    fn new() -> Self {
        Counting { base: 7 }
    }
}

#[bench_class(runs = 2, constructor = "Counting::new")]
impl Counting {
    fn sum(&self) {
        Ticker::named("counting").tick_by(self.base);
    }

    fn double(&mut self) {
        Ticker::named("counting").tick_by(self.base * 2);
    }

    fn scaled(&self, factor: u64) -> u64 {
        self.base * factor
    }

    #[skip_bench]
    fn ignored(&self) {}
}

#[test]
fn test_class_runs_and_constructor() {
    let result = run_class("Counting", ticks("counting"));

    let class = result.class("Counting").unwrap();
    let names: Vec<_> = class.methods.iter().map(|m| m.method.as_str()).collect();
    assert_eq!(names, ["sum", "double"]);
    assert_eq!(class.methods[0].samples(0), [7.0, 7.0]);
    assert_eq!(class.methods[1].samples(0), [14.0, 14.0]);
    assert_eq!(Counting::new().scaled(3), 21);

    // Class statistics pool the raw samples of every method
    let stats = class.statistics(0, &ConfidenceLevels::default());
    assert_eq!(stats.count(), 4);
    assert_eq!(stats.sum(), 42.0);
    assert!(stats.min() <= stats.mean() && stats.mean() <= stats.max());
}

#[derive(Default)]
struct Order;

#[bench_class(runs = 1)]
impl Order {
    fn a(&self) {}
    fn b(&self) {}
    fn c(&self) {}
    fn d(&self) {}
    fn e(&self) {}
}

#[test]
fn test_seeded_shuffle_is_reproducible() {
    let order = |seed| {
        let result = run_class(
            "Order",
            EngineConfig {
                arrangement: Arrangement::Shuffled,
                seed: Some(seed),
                ..EngineConfig::default()
            },
        );
        assert_eq!(result.seed, Some(seed));
        result
            .classes
            .iter()
            .flat_map(|c| c.methods.iter().map(|m| m.method.clone()))
            .collect::<Vec<_>>()
    };

    assert_eq!(order(11), order(11));
    let mut sorted = order(11);
    sorted.sort();
    assert_eq!(sorted, ["a", "b", "c", "d", "e"]);
}

#[test]
fn test_filter_selects_methods() {
    let result = run_class(
        "Order",
        EngineConfig {
            filter: PlanFilter::new(Some("::(b|d)$"), None).unwrap(),
            ..EngineConfig::default()
        },
    );
    let names: Vec<_> = result.methods().map(|m| m.method.as_str()).collect();
    assert_eq!(names, ["b", "d"]);
}

// ============================================================================
// Reports and progress
// ============================================================================

#[derive(Default)]
struct Reported {
    n: u64,
}

#[bench_class]
impl Reported {
    #[bench(runs = 10)]
    fn count(&mut self) {
        self.n += 1;
        Ticker::named("reported").tick_by(self.n);
    }
}

#[test]
fn test_reports_over_a_real_run() {
    let result = run_class("Reported", ticks("reported"));

    let table = render_table(&result, &TableOptions::default());
    let row = table
        .lines()
        .find(|l| l.contains("Reported::count"))
        .unwrap();
    for value in ["55.00", "1.00", "10.00", "5.50"] {
        assert!(row.contains(value), "{value} missing from {row}");
    }

    let json = generate_json_report(&result, &ConfidenceLevels::default()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(parsed["meta"]["timestamp"].is_string());

    let dir = tempfile::tempdir().unwrap();
    let paths = export_raw_csv(&result, dir.path()).unwrap();
    assert_eq!(paths.len(), 1);
    let raw = std::fs::read_to_string(&paths[0]).unwrap();
    assert_eq!(raw.trim(), "1,2,3,4,5,6,7,8,9,10");
}

#[derive(Default)]
struct Streamed;

#[bench_class]
impl Streamed {
    #[bench(runs = 2)]
    fn quick(&self) {}
}

/// Writer whose bytes stay readable after the engine drops the listener
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_progress_stream_end_to_end() {
    let buffer = SharedBuffer::default();
    let class = registered_class("Streamed").unwrap();
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.add_listener(Box::new(SocketProgressListener::new(ProgressSender::new(
        buffer.clone(),
    ))));
    engine.run(&[class]);
    drop(engine);

    let bytes = buffer.0.lock().unwrap().clone();
    let mut events = Vec::new();
    let exit = ProgressReceiver::new(Cursor::new(bytes)).run(|e| events.push(e));
    assert_eq!(exit, ReceiverExit::Finished);
    assert_eq!(
        events,
        [
            ProgressEvent::Init(vec![RunTotal {
                element: "Streamed::quick".to_string(),
                runs: 2,
            }]),
            ProgressEvent::UpdateCurrentRun("Streamed::quick".to_string()),
            ProgressEvent::UpdateCurrentRun("Streamed::quick".to_string()),
            ProgressEvent::Finished,
        ]
    );
}
