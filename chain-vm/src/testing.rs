//! Scripted machine for keeper and handler tests

use crate::banker::BankerType;
use crate::convert::NativeValue;
use crate::machine::{
    FunctionSignature, Machine, MachineFactory, MachineOptions, NamedType, TypedValue,
};
use crate::natives::STD_PKG;
use crate::{VmError, VmResult};
use chain_core::{Coin, Coins, MemFile, MemPackage};

pub(crate) fn demo_package(path: &str) -> MemPackage {
    let name = path.rsplit('/').next().unwrap_or("demo").to_string();
    MemPackage {
        name: name.clone(),
        path: path.to_string(),
        files: vec![
            MemFile {
                name: "README.md".to_string(),
                body: format!("# {}", name),
            },
            MemFile {
                name: format!("{}.gno", name),
                body: format!("package {}", name),
            },
        ],
    }
}

fn sig(name: &str, params: &[(&str, &str)], results: &[(&str, &str)]) -> FunctionSignature {
    FunctionSignature {
        func_name: name.to_string(),
        params: params.iter().map(|(n, t)| NamedType::new(*n, *t)).collect(),
        results: results.iter().map(|(n, t)| NamedType::new(*n, *t)).collect(),
        receiver: None,
    }
}

/// Understands a handful of fixed functions and expressions
pub(crate) struct ScriptedFactory;

impl MachineFactory for ScriptedFactory {
    fn new_machine(&self, options: MachineOptions) -> Box<dyn Machine> {
        Box::new(ScriptedMachine { options })
    }

    fn function_signatures(&self, _pkg: &MemPackage) -> VmResult<Vec<FunctionSignature>> {
        let mut method = sig("String", &[], &[("", "string")]);
        method.receiver = Some("Point".to_string());
        Ok(vec![
            sig("Add", &[("a", "int"), ("b", "int")], &[("", "int")]),
            sig("Refund", &[("amount", "int64")], &[]),
            sig("helper", &[], &[]),
            method,
            sig("Height", &[], &[("", "int64")]),
            sig("Drain", &[], &[]),
        ])
    }
}

struct ScriptedMachine {
    options: MachineOptions,
}

impl ScriptedMachine {
    fn native(&self, name: &str, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
        self.options
            .natives
            .call(&self.options.context, STD_PKG, name, args)
    }
}

impl Machine for ScriptedMachine {
    fn run_mem_package(&mut self, pkg: &MemPackage) -> VmResult<()> {
        if pkg.path.ends_with("broken") {
            panic!("undefined: missing");
        }
        Ok(())
    }

    fn call(&mut self, func: &str, args: Vec<TypedValue>) -> VmResult<Vec<TypedValue>> {
        match (func, args.as_slice()) {
            ("Add", [TypedValue::Int { value: a, .. }, TypedValue::Int { value: b, .. }]) => {
                Ok(vec![TypedValue::int(a + b)])
            }
            ("Refund", [TypedValue::Int { value, .. }]) => {
                let to = self.options.context.orig_caller.to_vm();
                let amt = Coins::from(Coin::new("ugnot", *value)).to_vm();
                self.native("Send", &[to, amt])?;
                Ok(vec![])
            }
            _ => Err(VmError::Machine(format!("cannot call {}", func))),
        }
    }

    fn eval(&mut self, expr: &str) -> VmResult<Vec<TypedValue>> {
        match expr {
            "Height()" => self.native("GetHeight", &[]),
            "Drain()" => {
                let banker = self
                    .native("GetBanker", &[TypedValue::uint8(BankerType::RealmSend as u8)])?
                    .remove(0);
                let ctx = &self.options.context;
                let balance = ctx.banker.get_coins(&ctx.orig_pkg_addr);
                let args = [
                    banker,
                    ctx.orig_pkg_addr.to_vm(),
                    ctx.orig_caller.to_vm(),
                    balance.to_vm(),
                ];
                self.native("Banker.SendCoins", &args)
            }
            other => Err(VmError::invalid_expr(format!("cannot evaluate {}", other))),
        }
    }

    fn stacktrace(&self) -> String {
        format!("{}\n    at main()", self.options.pkg_path)
    }
}
