//! Benchmark elements and the class registry
//!
//! A benchmarked class is described by a [`ClassDef`]: a constructor plus a
//! table of [`MethodDef`]s, each carrying the annotations found on it and a
//! type-erased entry point. `#[bench_class]` generates these tables and
//! submits them to the registry; tests and embedders may build them by hand.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Type-erased call of a zero-argument method on a class instance
pub type MethodFn = fn(&mut dyn Any) -> Result<(), String>;

/// Type-erased class constructor
pub type ConstructorFn = fn() -> Box<dyn Any>;

/// Lifecycle role a method plays, or the phase a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Once before the first method of a class
    BeforeBenchClass,
    /// Once before the first repetition of a method
    BeforeFirstRun,
    /// Before every repetition
    BeforeEachRun,
    /// The benchmark body
    Bench,
    /// After every repetition
    AfterEachRun,
    /// Once after the last repetition of a method
    AfterLastRun,
    /// Once after the last method of a class
    AfterBenchClass,
    /// A meter could not be read
    Meter,
    /// The method could not be classified
    Classification,
}

impl Role {
    /// Attribute name used on methods
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::BeforeBenchClass => "before_bench_class",
            Role::BeforeFirstRun => "before_first_run",
            Role::BeforeEachRun => "before_each_run",
            Role::Bench => "bench",
            Role::AfterEachRun => "after_each_run",
            Role::AfterLastRun => "after_last_run",
            Role::AfterBenchClass => "after_bench_class",
            Role::Meter => "meter",
            Role::Classification => "classification",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of a `#[bench(...)]` attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BenchAttr {
    /// Explicit repetition count; `None` or `Some(0)` means "use the default"
    pub runs: Option<u32>,
    /// Named hook run once before the first repetition
    pub before_first_run: Option<&'static str>,
    /// Named hook run before every repetition
    pub before_each_run: Option<&'static str>,
    /// Named hook run after every repetition
    pub after_each_run: Option<&'static str>,
    /// Named hook run once after the last repetition
    pub after_last_run: Option<&'static str>,
}

impl BenchAttr {
    /// Explicit hook name for a method-level role
    pub fn hook_name(&self, role: Role) -> Option<&'static str> {
        match role {
            Role::BeforeFirstRun => self.before_first_run,
            Role::BeforeEachRun => self.before_each_run,
            Role::AfterEachRun => self.after_each_run,
            Role::AfterLastRun => self.after_last_run,
            _ => None,
        }
    }
}

/// One attribute found on a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// `#[before_bench_class]`
    BeforeBenchClass,
    /// `#[before_first_run]`
    BeforeFirstRun,
    /// `#[before_each_run]`
    BeforeEachRun,
    /// `#[bench(...)]`
    Bench(BenchAttr),
    /// `#[after_each_run]`
    AfterEachRun,
    /// `#[after_last_run]`
    AfterLastRun,
    /// `#[after_bench_class]`
    AfterBenchClass,
    /// `#[skip_bench]`
    Skip,
}

impl Annotation {
    /// Lifecycle role marked by this annotation, if it is a role marker
    pub fn marker_role(&self) -> Option<Role> {
        match self {
            Annotation::BeforeBenchClass => Some(Role::BeforeBenchClass),
            Annotation::BeforeFirstRun => Some(Role::BeforeFirstRun),
            Annotation::BeforeEachRun => Some(Role::BeforeEachRun),
            Annotation::AfterEachRun => Some(Role::AfterEachRun),
            Annotation::AfterLastRun => Some(Role::AfterLastRun),
            Annotation::AfterBenchClass => Some(Role::AfterBenchClass),
            Annotation::Bench(_) | Annotation::Skip => None,
        }
    }
}

/// How a method takes `self`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Associated function without `self`
    None,
    /// `&self`
    Ref,
    /// `&mut self`
    Mut,
}

/// A method declared on a benchmarked class
#[derive(Debug, Clone, Copy)]
pub struct MethodDef {
    /// Method name
    pub name: &'static str,
    /// Attributes found on the method
    pub annotations: &'static [Annotation],
    /// Receiver kind
    pub receiver: Receiver,
    /// Number of parameters besides the receiver
    pub params: usize,
    /// Entry point; `None` when the method cannot be called without arguments
    pub invoke: Option<MethodFn>,
}

impl MethodDef {
    /// The `#[bench]` options, if the method is marked as a benchmark
    pub fn bench_attr(&self) -> Option<&BenchAttr> {
        self.annotations.iter().find_map(|a| match a {
            Annotation::Bench(attr) => Some(attr),
            _ => None,
        })
    }

    /// Whether the method carries `#[skip_bench]`
    pub fn is_skipped(&self) -> bool {
        self.annotations.contains(&Annotation::Skip)
    }

    /// Whether the method is marked with the given lifecycle role
    pub fn has_role(&self, role: Role) -> bool {
        self.annotations
            .iter()
            .any(|a| a.marker_role() == Some(role))
    }

    /// Whether the method is a zero-argument instance method
    pub fn is_invocable(&self) -> bool {
        self.receiver != Receiver::None && self.params == 0 && self.invoke.is_some()
    }

    /// Entry point for zero-argument instance methods
    pub fn entry_point(&self) -> Option<MethodFn> {
        if self.receiver != Receiver::None && self.params == 0 {
            self.invoke
        } else {
            None
        }
    }
}

/// A benchmarked class
#[derive(Debug)]
pub struct ClassDef {
    /// Type name
    pub name: &'static str,
    /// Module the type was declared in
    pub module_path: &'static str,
    /// Class-wide repetition count; when set, every unannotated zero-argument
    /// method becomes a benchmark
    pub runs: Option<u32>,
    /// Constructor producing the shared instance
    pub instantiate: ConstructorFn,
    /// Declared methods in declaration order
    pub methods: &'static [MethodDef],
}

impl ClassDef {
    /// Look up a method by name
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

inventory::collect!(ClassDef);

/// All classes registered through `#[bench_class]`, sorted by name
pub fn registered_classes() -> Vec<&'static ClassDef> {
    let mut classes: Vec<_> = inventory::iter::<ClassDef>.into_iter().collect();
    classes.sort_by_key(|c| (c.name, c.module_path));
    classes
}

/// The registered class with the given name
pub fn registered_class(name: &str) -> Option<&'static ClassDef> {
    inventory::iter::<ClassDef>
        .into_iter()
        .find(|c| c.name == name)
}

/// Conversion of a method's return value into the invoker's outcome
pub trait MethodOutcome {
    /// `Ok(())` on success, `Err(message)` when the method reports failure
    fn into_outcome(self) -> Result<(), String>;
}

impl MethodOutcome for () {
    #[inline]
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<T, E: fmt::Display> MethodOutcome for Result<T, E> {
    #[inline]
    fn into_outcome(self) -> Result<(), String> {
        self.map(|value| {
            std::hint::black_box(value);
        })
        .map_err(|e| e.to_string())
    }
}

/// Message returned by generated entry points handed the wrong instance type
#[doc(hidden)]
pub fn wrong_instance<T>() -> String {
    format!(
        "instance is not a `{}`; entry point called on a foreign class",
        std::any::type_name::<T>()
    )
}
