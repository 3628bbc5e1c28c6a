//! Panic boundary around machine execution and result marshalling

use crate::machine::{Machine, TypedValue};
use crate::natives::NativeRegistry;
use crate::{VmError, VmResult};
use chain_core::MemPackage;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs a machine, turning its panics into [`VmError::Panic`]
pub struct Wrapper {
    machine: Box<dyn Machine>,
    natives: Arc<NativeRegistry>,
}

impl Wrapper {
    pub fn new(machine: Box<dyn Machine>, natives: Arc<NativeRegistry>) -> Self {
        Self { machine, natives }
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut dyn Machine) -> VmResult<T>) -> VmResult<T> {
        let machine = &mut self.machine;
        match catch_unwind(AssertUnwindSafe(|| f(machine.as_mut()))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload);
                let stacktrace = self.machine.stacktrace();
                warn!("VM panic: {}", message);
                Err(VmError::Panic {
                    message,
                    stacktrace,
                })
            }
        }
    }

    pub fn run_mem_package(&mut self, pkg: &MemPackage) -> VmResult<()> {
        self.guard(|m| m.run_mem_package(pkg))
    }

    /// Call a function and render its results
    pub fn call(&mut self, func: &str, args: Vec<TypedValue>) -> VmResult<String> {
        let results = self.guard(|m| m.call(func, args))?;
        self.render(&results)
    }

    /// Evaluate an expression and render its results
    pub fn eval(&mut self, expr: &str) -> VmResult<String> {
        let results = self.guard(|m| m.eval(expr))?;
        self.render(&results)
    }

    /// Struct-like values become host records; any other value ends the
    /// output, so later results are dropped.
    fn render(&self, results: &[TypedValue]) -> VmResult<String> {
        let mut lines = Vec::with_capacity(results.len());
        for value in results {
            if value.is_struct_like() {
                lines.push(self.render_record(value)?);
                continue;
            }
            lines.push(value.to_string());
            return Ok(lines.join("\n"));
        }
        Ok(lines.join("\n"))
    }

    fn render_record(&self, value: &TypedValue) -> VmResult<String> {
        if let Some(host) = self.natives.to_host(value) {
            return Ok(host?.to_string());
        }
        let fields = match value.underlying() {
            TypedValue::Struct { fields, .. } => fields,
            _ => return Ok(value.to_string()),
        };
        let record: Map<String, Value> = fields
            .iter()
            .map(|(name, field)| (name.clone(), Value::String(field.to_string())))
            .collect();
        serde_json::to_string(&record).map_err(|e| VmError::Conversion(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::NativeValue;
    use chain_core::Coin;

    struct Scripted {
        results: Vec<TypedValue>,
        panic_with: Option<&'static str>,
    }

    impl Machine for Scripted {
        fn run_mem_package(&mut self, _pkg: &MemPackage) -> VmResult<()> {
            if let Some(msg) = self.panic_with {
                panic!("{}", msg);
            }
            Ok(())
        }

        fn call(&mut self, _func: &str, _args: Vec<TypedValue>) -> VmResult<Vec<TypedValue>> {
            self.eval("")
        }

        fn eval(&mut self, _expr: &str) -> VmResult<Vec<TypedValue>> {
            if let Some(msg) = self.panic_with {
                panic!("{}", msg);
            }
            Ok(self.results.clone())
        }

        fn stacktrace(&self) -> String {
            "main()\n    demo.gno:3".to_string()
        }
    }

    fn wrapper(results: Vec<TypedValue>) -> Wrapper {
        Wrapper::new(
            Box::new(Scripted {
                results,
                panic_with: None,
            }),
            Arc::new(NativeRegistry::with_std()),
        )
    }

    fn point() -> TypedValue {
        TypedValue::Pointer(Box::new(TypedValue::Struct {
            type_tag: "demo.Point".to_string(),
            fields: vec![
                ("X".to_string(), TypedValue::int(1)),
                ("Y".to_string(), TypedValue::int(2)),
            ],
        }))
    }

    #[test]
    fn test_renders_single_value() {
        let mut w = wrapper(vec![TypedValue::int(42)]);
        assert_eq!(w.eval("X").unwrap(), "(42 int)");
    }

    #[test]
    fn test_stops_at_first_non_struct() {
        let mut w = wrapper(vec![
            TypedValue::string("a"),
            TypedValue::string("b"),
        ]);
        assert_eq!(w.eval("F()").unwrap(), "(\"a\" string)");
    }

    #[test]
    fn test_struct_results_become_records() {
        let mut w = wrapper(vec![
            point(),
            Coin::new("ugnot", 3).to_vm(),
            TypedValue::Bool(true),
            TypedValue::int(9),
        ]);
        assert_eq!(
            w.call("F", vec![]).unwrap(),
            "{\"X\":\"(1 int)\",\"Y\":\"(2 int)\"}\n3ugnot\n(true bool)"
        );
    }

    #[test]
    fn test_panic_is_caught() {
        let mut w = Wrapper::new(
            Box::new(Scripted {
                results: vec![],
                panic_with: Some("division by zero"),
            }),
            Arc::new(NativeRegistry::with_std()),
        );
        match w.eval("1/0") {
            Err(VmError::Panic {
                message,
                stacktrace,
            }) => {
                assert_eq!(message, "division by zero");
                assert!(stacktrace.contains("demo.gno:3"));
            }
            other => panic!("unexpected result {:?}", other),
        }
        let pkg = MemPackage {
            name: "demo".to_string(),
            path: "gno.land/r/demo".to_string(),
            files: vec![],
        };
        assert!(matches!(w.run_mem_package(&pkg), Err(VmError::Panic { .. })));
    }
}
