//! Benchmark Engine
//!
//! Drives one full run: classification, arrangement, the per-class and
//! per-method lifecycle, meter polling and result collection.
//!
//! ```text
//! Idle ─▶ ClassSetup ─▶ MethodSetup ─▶ RunLoop ─▶ MethodTeardown ─┐
//!  ▲           ▲                                                 │
//!  │           └──────────── next method of the class ◀──────────┤
//!  └───────────────── ClassTeardown ◀── last method of class ◀───┘
//!                                         ...
//!                                       Finished
//! ```
//!
//! The engine is single-threaded and runs user code on the calling thread.
//! There is no per-repetition timeout: a body that never returns stalls the
//! run.

use crate::arrangement::{Arrangement, PlanFilter, Schedule, Scheduled, arrange};
use crate::classifier::{BenchmarkMethod, ClassPlan, ClassifyConfig, DEFAULT_RUNS, Hook, classify};
use crate::element::{ClassDef, Role, registered_classes};
use crate::invoker::{InvocationError, instantiate, invoke};
use crate::listener::{BenchListener, ListenerError, PlannedRuns};
use crate::measure::pin_to_cpu;
use crate::meter::{Meter, MeterError, MeterKind, MeterSpec, Time, TimeMeter};
use crate::result::{BenchmarkResult, Failure};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while setting up an engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Duplicate meter: {0}")]
    DuplicateMeter(String),
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Runs for methods without an explicit count
    pub default_runs: u32,
    /// Method order
    pub arrangement: Arrangement,
    /// Shuffle seed; drawn at random when `None`
    pub seed: Option<u64>,
    /// Meters to build for the run
    pub meters: Vec<MeterSpec>,
    /// Methods to include
    pub filter: PlanFilter,
    /// Pin the engine thread to this CPU while running
    pub pin_cpu: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_runs: DEFAULT_RUNS,
            arrangement: Arrangement::Sequential,
            seed: None,
            meters: Vec::new(),
            filter: PlanFilter::default(),
            pin_cpu: None,
        }
    }
}

/// Phase the engine is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Between classes, or not started
    Idle,
    /// Constructing a class instance and running its class setup
    ClassSetup,
    /// Running the before-first-run hook
    MethodSetup,
    /// Repeating the benchmark body
    RunLoop,
    /// Running the after-last-run hook
    MethodTeardown,
    /// Running the class teardown
    ClassTeardown,
    /// All methods done
    Finished,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::ClassSetup => "class setup",
            EngineState::MethodSetup => "method setup",
            EngineState::RunLoop => "run loop",
            EngineState::MethodTeardown => "method teardown",
            EngineState::ClassTeardown => "class teardown",
            EngineState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Shared instance of a class, or the reason it could not be set up
enum ClassSlot {
    Ready(Box<dyn Any>),
    Failed(String),
}

#[derive(Default)]
struct Listeners(Vec<Box<dyn BenchListener>>);

impl Listeners {
    fn notify(
        &mut self,
        event: &str,
        mut f: impl FnMut(&mut dyn BenchListener) -> Result<(), ListenerError>,
    ) {
        for listener in &mut self.0 {
            if let Err(e) = f(listener.as_mut()) {
                warn!(event, error = %e, "listener failed");
            }
        }
    }
}

/// Runs benchmark classes and collects their results
pub struct Engine {
    config: EngineConfig,
    meters: Vec<Box<dyn Meter>>,
    listeners: Listeners,
    state: EngineState,
}

impl Engine {
    /// Create an engine, building the configured meters
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let specs = config.meters.clone();
        let mut engine = Self {
            config,
            meters: Vec::with_capacity(specs.len()),
            listeners: Listeners::default(),
            state: EngineState::Idle,
        };
        for spec in &specs {
            engine.add_meter(spec.build())?;
        }
        Ok(engine)
    }

    /// Add a meter; its label must not clash with an existing one
    pub fn add_meter(&mut self, meter: Box<dyn Meter>) -> Result<(), EngineError> {
        let label = meter.info().label();
        if self.meters.iter().any(|m| m.info().label() == label) {
            return Err(EngineError::DuplicateMeter(label));
        }
        self.meters.push(meter);
        Ok(())
    }

    /// Add a listener
    pub fn add_listener(&mut self, listener: Box<dyn BenchListener>) {
        self.listeners.0.push(listener);
    }

    /// Current phase
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run every class registered through `#[bench_class]`
    pub fn run_registered(&mut self) -> BenchmarkResult {
        self.run(&registered_classes())
    }

    /// Run the given classes.
    ///
    /// Failures of user code are recorded in the result; this never fails.
    pub fn run(&mut self, classes: &[&'static ClassDef]) -> BenchmarkResult {
        if self.meters.is_empty() {
            self.meters.push(Box::new(TimeMeter::new(Time::Milliseconds)));
        }
        if let Some(cpu) = self.config.pin_cpu {
            if let Err(e) = pin_to_cpu(cpu) {
                warn!(cpu, error = %e, "failed to pin engine thread");
            }
        }

        let mut result = BenchmarkResult::new(self.meters.iter().map(|m| m.info()).collect());
        result.arrangement = self.config.arrangement;

        let (plans, schedule, classification_failures) = self.plan(classes);
        result.seed = schedule.seed;

        let planned: Vec<PlannedRuns> = schedule
            .entries
            .iter()
            .map(|e| PlannedRuns {
                method: e.method.id(),
                runs: e.runs,
            })
            .collect();
        info!(
            methods = schedule.len(),
            runs = schedule.total_runs(),
            arrangement = %self.config.arrangement,
            seed = ?schedule.seed,
            "starting benchmark run"
        );
        self.listeners.notify("init", |l| l.init(&planned));

        for failure in classification_failures {
            self.record(&mut result, failure);
        }

        let mut slots: HashMap<&'static str, ClassSlot> = HashMap::new();

        for (idx, entry) in schedule.entries.iter().enumerate() {
            let class_name = entry.method.class_name;
            let Some(plan) = plans.get(class_name) else {
                continue;
            };

            if !slots.contains_key(class_name) {
                self.transition(EngineState::ClassSetup);
                let slot = self.set_up_class(plan, &mut result);
                slots.insert(class_name, slot);
            }

            match slots.get_mut(class_name) {
                Some(ClassSlot::Ready(instance)) => {
                    self.run_method(instance.as_mut(), entry, &mut result);
                }
                Some(ClassSlot::Failed(reason)) => {
                    let id = entry.method.id();
                    debug!(method = %id, "skipped after class setup failure");
                    result.method_entry(class_name, entry.method.method_name, entry.runs);
                    let reason = reason.as_str();
                    self.listeners.notify("skipped", |l| l.skipped(&id, reason));
                }
                None => {}
            }

            if schedule.last_of_class(class_name) == Some(idx) {
                if let Some(ClassSlot::Ready(mut instance)) = slots.remove(class_name) {
                    self.transition(EngineState::ClassTeardown);
                    if let Some(hook) = plan.after_class {
                        if let Err(e) = call_hook(instance.as_mut(), hook, Role::AfterBenchClass) {
                            let failure = Failure::from_invocation(class_name, hook.name, &e, None);
                            self.record(&mut result, failure);
                        }
                    }
                }
                self.transition(EngineState::Idle);
            }
        }

        self.transition(EngineState::Finished);
        info!(
            samples = result.total_samples(),
            failures = result.failures.len(),
            "benchmark run finished"
        );
        self.listeners.notify("finished", |l| l.finished(&result));
        result
    }

    fn plan(
        &self,
        classes: &[&'static ClassDef],
    ) -> (HashMap<&'static str, ClassPlan>, Schedule, Vec<Failure>) {
        let classify_config = ClassifyConfig {
            default_runs: self.config.default_runs,
        };
        let filter = &self.config.filter;

        let mut plans = HashMap::new();
        let mut methods = Vec::new();
        let mut failures = Vec::new();
        let mut seen = HashSet::new();

        for &class in classes {
            if !filter.admits_class(class.name) {
                continue;
            }
            if !seen.insert(class.name) {
                warn!(class = class.name, module = class.module_path, "duplicate class name ignored");
                continue;
            }

            let plan = classify(class, &classify_config);
            failures.extend(
                plan.failures
                    .iter()
                    .filter(|f| filter.matches_id(&f.class, &f.method))
                    .cloned(),
            );
            methods.extend(filter.apply(plan.methods.clone()));
            plans.insert(class.name, plan);
        }

        let schedule = arrange(methods, self.config.arrangement, self.config.seed);
        (plans, schedule, failures)
    }

    fn set_up_class(&mut self, plan: &ClassPlan, result: &mut BenchmarkResult) -> ClassSlot {
        let class = plan.class;

        let mut instance = match instantiate(class) {
            Ok(instance) => instance,
            Err(e) => {
                let reason = e.to_string();
                self.record(result, Failure::from_invocation(class.name, class.name, &e, None));
                return ClassSlot::Failed(reason);
            }
        };

        if let Some(hook) = plan.before_class {
            if let Err(e) = call_hook(instance.as_mut(), hook, Role::BeforeBenchClass) {
                let reason = e.to_string();
                self.record(result, Failure::from_invocation(class.name, hook.name, &e, None));
                return ClassSlot::Failed(reason);
            }
        }

        ClassSlot::Ready(instance)
    }

    fn run_method(&mut self, instance: &mut dyn Any, entry: &Scheduled, result: &mut BenchmarkResult) {
        let method = &entry.method;
        result.method_entry(method.class_name, method.method_name, entry.runs);

        self.transition(EngineState::MethodSetup);
        let setup = call_slot(instance, method, Role::BeforeFirstRun);

        match setup {
            Ok(()) => {
                self.transition(EngineState::RunLoop);
                for repetition in entry.repetitions() {
                    self.run_repetition(instance, entry, repetition, result);
                }
            }
            Err(e) => {
                let failure = Failure::from_invocation(method.class_name, method.method_name, &e, None);
                self.record(result, failure);
            }
        }

        // Runs even when setup failed, to release whatever setup acquired.
        self.transition(EngineState::MethodTeardown);
        if let Err(e) = call_slot(instance, method, Role::AfterLastRun) {
            let failure = Failure::from_invocation(method.class_name, method.method_name, &e, None);
            self.record(result, failure);
        }
    }

    fn run_repetition(
        &mut self,
        instance: &mut dyn Any,
        entry: &Scheduled,
        repetition: u32,
        result: &mut BenchmarkResult,
    ) {
        let method = &entry.method;
        let failed = |e: InvocationError| {
            Failure::from_invocation(method.class_name, method.method_name, &e, Some(repetition))
        };

        if let Err(e) = call_slot(instance, method, Role::BeforeEachRun) {
            self.record(result, failed(e));
            return;
        }

        let measured = self.measure(instance, entry, repetition);

        let teardown = call_slot(instance, method, Role::AfterEachRun).map_err(failed);

        match (measured, teardown) {
            (Ok(samples), Ok(())) => {
                result
                    .method_entry(method.class_name, method.method_name, entry.runs)
                    .push_run(&samples);
                let id = method.id();
                self.listeners
                    .notify("run_completed", |l| l.run_completed(&id, repetition, &samples));
            }
            (measured, teardown) => {
                for failure in [measured.err(), teardown.err()].into_iter().flatten() {
                    self.record(result, failure);
                }
            }
        }
    }

    /// Poll the meters around one call of the body.
    fn measure(
        &mut self,
        instance: &mut dyn Any,
        entry: &Scheduled,
        repetition: u32,
    ) -> Result<Vec<f64>, Failure> {
        let method = &entry.method;
        let meter_failed = |e: MeterError| {
            Failure::meter(method.class_name, method.method_name, repetition, e.to_string())
        };

        let mut before = vec![0.0; self.meters.len()];
        for (slot, meter) in before.iter_mut().zip(self.meters.iter_mut()) {
            if meter.kind() == MeterKind::Bracket {
                *slot = meter.value().map_err(meter_failed)?;
            }
        }

        invoke(instance, method.method_name, method.body, Role::Bench).map_err(|e| {
            Failure::from_invocation(method.class_name, method.method_name, &e, Some(repetition))
        })?;

        // Reverse order keeps the first meter outermost.
        let mut after = vec![0.0; self.meters.len()];
        for (slot, meter) in after.iter_mut().zip(self.meters.iter_mut()).rev() {
            *slot = meter.value().map_err(meter_failed)?;
        }

        self.meters
            .iter()
            .zip(before.into_iter().zip(after))
            .map(|(meter, (before, after))| match meter.kind() {
                MeterKind::Absolute => Ok(after),
                MeterKind::Bracket if after >= before => Ok(after - before),
                MeterKind::Bracket => Err(meter_failed(MeterError::NegativeDelta {
                    meter: meter.name().to_string(),
                    before,
                    after,
                })),
            })
            .collect()
    }

    fn record(&mut self, result: &mut BenchmarkResult, failure: Failure) {
        warn!(
            method = %failure.method_id(),
            role = %failure.role,
            repetition = ?failure.repetition,
            message = %failure.message,
            "benchmark failure"
        );
        self.listeners.notify("failure", |l| l.failure(&failure));
        result.push_failure(failure);
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "engine state");
            self.state = next;
        }
    }
}

fn call_hook(instance: &mut dyn Any, hook: Hook, role: Role) -> Result<(), InvocationError> {
    invoke(instance, hook.name, hook.func, role)
}

/// Run the method's hook for `role`, if it has one
fn call_slot(
    instance: &mut dyn Any,
    method: &BenchmarkMethod,
    role: Role,
) -> Result<(), InvocationError> {
    match method.hook(role) {
        Some(&hook) => call_hook(instance, hook, role),
        None => Ok(()),
    }
}
