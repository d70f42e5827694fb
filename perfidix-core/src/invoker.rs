//! Lifecycle Invoker
//!
//! Calls user code through the type-erased entry points of the registry.
//! A method that returns an error and a method that panics both come back
//! as an [`InvocationError`] tagged with the role it was called in; nothing
//! unwinds past this module.

use crate::element::{ClassDef, MethodFn, Role};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// How a user method failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The method returned `Err`
    Returned,
    /// The method panicked
    Panicked,
}

/// A failed call of a user method
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{role} `{method}` {}: {message}", describe(.kind))]
pub struct InvocationError {
    /// Name of the method that failed
    pub method: String,
    /// Role the method was called in
    pub role: Role,
    /// Returned error or panic
    pub kind: FailureKind,
    /// Error or panic message
    pub message: String,
}

fn describe(kind: &FailureKind) -> &'static str {
    match kind {
        FailureKind::Returned => "returned an error",
        FailureKind::Panicked => "panicked",
    }
}

/// Invoke `func` on `instance` in the given role.
#[inline]
pub fn invoke(
    instance: &mut dyn Any,
    method: &str,
    func: MethodFn,
    role: Role,
) -> Result<(), InvocationError> {
    match catch_unwind(AssertUnwindSafe(|| func(instance))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(message)) => Err(InvocationError {
            method: method.to_string(),
            role,
            kind: FailureKind::Returned,
            message,
        }),
        Err(payload) => Err(InvocationError {
            method: method.to_string(),
            role,
            kind: FailureKind::Panicked,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Construct the shared instance of a class.
///
/// A panicking constructor is reported in the `BeforeBenchClass` role since
/// it is the first thing that runs for the class.
pub fn instantiate(class: &ClassDef) -> Result<Box<dyn Any>, InvocationError> {
    catch_unwind(class.instantiate).map_err(|payload| InvocationError {
        method: class.name.to_string(),
        role: Role::BeforeBenchClass,
        kind: FailureKind::Panicked,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    fn hit(instance: &mut dyn Any) -> Result<(), String> {
        match instance.downcast_mut::<Counter>() {
            Some(counter) => {
                counter.hits += 1;
                Ok(())
            }
            None => Err(crate::element::wrong_instance::<Counter>()),
        }
    }

    fn refuse(_: &mut dyn Any) -> Result<(), String> {
        Err("not today".to_string())
    }

    fn explode(_: &mut dyn Any) -> Result<(), String> {
        panic!("boom {}", 42)
    }

    fn explode_static(_: &mut dyn Any) -> Result<(), String> {
        panic!("static boom")
    }

    fn make_counter() -> Box<dyn Any> {
        Box::new(Counter::default())
    }

    fn make_nothing() -> Box<dyn Any> {
        panic!("constructor refused")
    }

    #[test]
    fn test_invoke_success() {
        let mut counter = Counter::default();
        invoke(&mut counter, "hit", hit, Role::Bench).unwrap();
        invoke(&mut counter, "hit", hit, Role::Bench).unwrap();
        assert_eq!(counter.hits, 2);
    }

    #[test]
    fn test_invoke_returned_error() {
        let mut counter = Counter::default();
        let err = invoke(&mut counter, "refuse", refuse, Role::BeforeEachRun).unwrap_err();
        assert_eq!(err.kind, FailureKind::Returned);
        assert_eq!(err.role, Role::BeforeEachRun);
        assert_eq!(err.message, "not today");
        assert_eq!(
            err.to_string(),
            "before_each_run `refuse` returned an error: not today"
        );
    }

    #[test]
    fn test_invoke_panics_are_captured() {
        let mut counter = Counter::default();
        let err = invoke(&mut counter, "explode", explode, Role::Bench).unwrap_err();
        assert_eq!(err.kind, FailureKind::Panicked);
        assert_eq!(err.message, "boom 42");

        let err = invoke(&mut counter, "explode_static", explode_static, Role::Bench).unwrap_err();
        assert_eq!(err.message, "static boom");
    }

    #[test]
    fn test_wrong_instance_type() {
        let mut not_a_counter = 5_u8;
        let err = invoke(&mut not_a_counter, "hit", hit, Role::Bench).unwrap_err();
        assert_eq!(err.kind, FailureKind::Returned);
        assert!(err.message.contains("Counter"));
    }

    #[test]
    fn test_instantiate() {
        let class = ClassDef {
            name: "Counter",
            module_path: module_path!(),
            runs: None,
            instantiate: make_counter,
            methods: &[],
        };
        let instance = instantiate(&class).unwrap();
        assert!(instance.downcast_ref::<Counter>().is_some());

        let broken = ClassDef {
            name: "Broken",
            instantiate: make_nothing,
            ..class
        };
        let err = instantiate(&broken).unwrap_err();
        assert_eq!(err.role, Role::BeforeBenchClass);
        assert_eq!(err.message, "constructor refused");
    }
}
