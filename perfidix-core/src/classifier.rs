//! Method Classifier
//!
//! Turns a [`ClassDef`] into a [`ClassPlan`]: the benchmark methods of the
//! class with their run counts and resolved hooks, plus the class-level
//! hooks. Invalid methods are reported as classification failures and left
//! out of the plan; classification itself never fails.

use crate::element::{ClassDef, MethodDef, MethodFn, Role};
use crate::result::Failure;
use std::sync::Arc;
use tracing::{debug, warn};

/// Repetitions used when neither the method nor the class configures any
pub const DEFAULT_RUNS: u32 = 1000;

/// Method-level hook slots in execution order
const METHOD_HOOKS: [Role; 4] = [
    Role::BeforeFirstRun,
    Role::BeforeEachRun,
    Role::AfterEachRun,
    Role::AfterLastRun,
];

/// A resolved setup or teardown method
#[derive(Debug, Clone, Copy)]
pub struct Hook {
    /// Method name
    pub name: &'static str,
    /// Entry point
    pub func: MethodFn,
}

/// A benchmark method ready for scheduling
#[derive(Debug, Clone)]
pub struct BenchmarkMethod {
    /// Owning class
    pub class_name: &'static str,
    /// Method name
    pub method_name: &'static str,
    /// Resolved repetition count, at least 1
    pub runs: u32,
    /// The measured body
    pub body: MethodFn,
    /// Once before the first repetition
    pub before_first_run: Option<Hook>,
    /// Before every repetition
    pub before_each_run: Option<Hook>,
    /// After every repetition
    pub after_each_run: Option<Hook>,
    /// Once after the last repetition
    pub after_last_run: Option<Hook>,
}

impl BenchmarkMethod {
    /// `Class::method`
    pub fn id(&self) -> String {
        format!("{}::{}", self.class_name, self.method_name)
    }

    /// Hook in the given method-level slot
    pub fn hook(&self, role: Role) -> Option<&Hook> {
        match role {
            Role::BeforeFirstRun => self.before_first_run.as_ref(),
            Role::BeforeEachRun => self.before_each_run.as_ref(),
            Role::AfterEachRun => self.after_each_run.as_ref(),
            Role::AfterLastRun => self.after_last_run.as_ref(),
            _ => None,
        }
    }

    fn set_hook(&mut self, role: Role, hook: Option<Hook>) {
        match role {
            Role::BeforeFirstRun => self.before_first_run = hook,
            Role::BeforeEachRun => self.before_each_run = hook,
            Role::AfterEachRun => self.after_each_run = hook,
            Role::AfterLastRun => self.after_last_run = hook,
            _ => {}
        }
    }
}

/// Classification settings
#[derive(Debug, Clone, Copy)]
pub struct ClassifyConfig {
    /// Runs for methods without an explicit count
    pub default_runs: u32,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            default_runs: DEFAULT_RUNS,
        }
    }
}

/// Classification outcome for one class
#[derive(Debug, Clone)]
pub struct ClassPlan {
    /// The classified class
    pub class: &'static ClassDef,
    /// Runs once before the first method of the class
    pub before_class: Option<Hook>,
    /// Runs once after the last method of the class
    pub after_class: Option<Hook>,
    /// Valid benchmark methods in declaration order
    pub methods: Vec<Arc<BenchmarkMethod>>,
    /// One entry per invalid benchmark method
    pub failures: Vec<Failure>,
}

impl ClassPlan {
    /// Whether the class contributes nothing to the run
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Classify the methods of a class.
pub fn classify(class: &'static ClassDef, config: &ClassifyConfig) -> ClassPlan {
    let candidates: Vec<&MethodDef> = class
        .methods
        .iter()
        .filter(|m| is_benchmark(class, m))
        .collect();

    let mut plan = ClassPlan {
        class,
        before_class: None,
        after_class: None,
        methods: Vec::with_capacity(candidates.len()),
        failures: Vec::new(),
    };

    if candidates.is_empty() {
        debug!(class = class.name, "no benchmark methods");
        return plan;
    }

    // Class-level hooks: any problem here invalidates every method.
    let mut class_errors = Vec::new();
    plan.before_class = marked_hook(class, Role::BeforeBenchClass, &mut class_errors);
    plan.after_class = marked_hook(class, Role::AfterBenchClass, &mut class_errors);

    for method in candidates {
        let mut errors = class_errors.clone();
        let resolved = resolve_method(class, method, config, &mut errors);

        match resolved {
            Some(bench) if errors.is_empty() => plan.methods.push(Arc::new(bench)),
            _ => {
                let message = errors.join("; ");
                warn!(class = class.name, method = method.name, %message, "classification failed");
                plan.failures
                    .push(Failure::classification(class.name, method.name, message));
            }
        }
    }

    if !plan.failures.is_empty() && plan.methods.is_empty() {
        plan.before_class = None;
        plan.after_class = None;
    }

    debug!(
        class = class.name,
        methods = plan.methods.len(),
        failures = plan.failures.len(),
        "classified"
    );
    plan
}

fn is_benchmark(class: &ClassDef, method: &MethodDef) -> bool {
    if method.is_skipped() {
        return false;
    }
    if method.bench_attr().is_some() {
        return true;
    }
    class.runs.is_some() && method.annotations.is_empty() && method.is_invocable()
}

fn resolve_method(
    class: &ClassDef,
    method: &MethodDef,
    config: &ClassifyConfig,
    errors: &mut Vec<String>,
) -> Option<BenchmarkMethod> {
    let attr = method.bench_attr().copied().unwrap_or_default();

    let body = match method.entry_point() {
        Some(body) => Some(body),
        None => {
            errors.push(format!(
                "benchmark method `{}` must take `&self` or `&mut self` and no other arguments",
                method.name
            ));
            None
        }
    };

    let runs = attr
        .runs
        .filter(|&r| r > 0)
        .or(class.runs.filter(|&r| r > 0))
        .unwrap_or(config.default_runs)
        .max(1);

    let mut hooks: [Option<Hook>; 4] = [None; 4];
    for (slot, role) in hooks.iter_mut().zip(METHOD_HOOKS) {
        *slot = match attr.hook_name(role) {
            Some(name) => named_hook(class, name, role, errors),
            None => marked_hook(class, role, errors),
        };
    }

    let mut bench = BenchmarkMethod {
        class_name: class.name,
        method_name: method.name,
        runs,
        body: body?,
        before_first_run: None,
        before_each_run: None,
        after_each_run: None,
        after_last_run: None,
    };
    for (hook, role) in hooks.into_iter().zip(METHOD_HOOKS) {
        bench.set_hook(role, hook);
    }
    Some(bench)
}

fn named_hook(
    class: &ClassDef,
    name: &'static str,
    role: Role,
    errors: &mut Vec<String>,
) -> Option<Hook> {
    match class.method(name) {
        Some(method) => invocable_hook(method, role, errors),
        None => {
            errors.push(format!(
                "{role} hook `{name}` not found in class `{}`",
                class.name
            ));
            None
        }
    }
}

fn marked_hook(class: &ClassDef, role: Role, errors: &mut Vec<String>) -> Option<Hook> {
    let mut marked = class.methods.iter().filter(|m| m.has_role(role));
    let first = marked.next()?;

    let others: Vec<_> = marked.map(|m| format!("`{}`", m.name)).collect();
    if !others.is_empty() {
        errors.push(format!(
            "more than one {role} method in class `{}`: `{}`, {}",
            class.name,
            first.name,
            others.join(", ")
        ));
        return None;
    }

    invocable_hook(first, role, errors)
}

fn invocable_hook(method: &MethodDef, role: Role, errors: &mut Vec<String>) -> Option<Hook> {
    match method.entry_point() {
        Some(func) => Some(Hook {
            name: method.name,
            func,
        }),
        None => {
            errors.push(format!(
                "{role} hook `{}` must take `&self` or `&mut self` and no other arguments",
                method.name
            ));
            None
        }
    }
}
