//! Interface to the external virtual machine
//!
//! The keeper never looks inside the machine. It hands over package files,
//! an [`ExecContext`] and the native registry, and gets back
//! [`TypedValue`]s.

use crate::banker::{Banker, BankerType, OrigSendBanker, ReadonlyBanker, RealmSendBanker};
use crate::natives::NativeRegistry;
use crate::store::PackageStore;
use crate::VmResult;
use chain_core::{Address, Coins, MemPackage};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Signed integer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntType {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
}

impl IntType {
    pub fn name(self) -> &'static str {
        match self {
            IntType::Int => "int",
            IntType::Int8 => "int8",
            IntType::Int16 => "int16",
            IntType::Int32 => "int32",
            IntType::Int64 => "int64",
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IntType::Int | IntType::Int64 => 64,
            IntType::Int8 => 8,
            IntType::Int16 => 16,
            IntType::Int32 => 32,
        }
    }
}

/// Unsigned integer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UintType {
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
}

impl UintType {
    pub fn name(self) -> &'static str {
        match self {
            UintType::Uint => "uint",
            UintType::Uint8 => "uint8",
            UintType::Uint16 => "uint16",
            UintType::Uint32 => "uint32",
            UintType::Uint64 => "uint64",
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            UintType::Uint | UintType::Uint64 => 64,
            UintType::Uint8 => 8,
            UintType::Uint16 => 16,
            UintType::Uint32 => 32,
        }
    }
}

/// A value as the machine sees it, tagged with its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedValue {
    Nil,
    Bool(bool),
    String(String),
    Int { ty: IntType, value: i64 },
    Uint { ty: UintType, value: u64 },
    /// `[]byte`
    Bytes(Vec<u8>),
    /// `[N]byte`
    ByteArray(Vec<u8>),
    /// A declared type over another value, e.g. `std.Address` over a string
    Named {
        type_tag: String,
        value: Box<TypedValue>,
    },
    Struct {
        type_tag: String,
        fields: Vec<(String, TypedValue)>,
    },
    Slice {
        elem_type: String,
        items: Vec<TypedValue>,
    },
    Pointer(Box<TypedValue>),
}

impl TypedValue {
    pub fn string(s: impl Into<String>) -> Self {
        TypedValue::String(s.into())
    }

    pub fn int(value: i64) -> Self {
        TypedValue::Int {
            ty: IntType::Int,
            value,
        }
    }

    pub fn int64(value: i64) -> Self {
        TypedValue::Int {
            ty: IntType::Int64,
            value,
        }
    }

    pub fn uint8(value: u8) -> Self {
        TypedValue::Uint {
            ty: UintType::Uint8,
            value: value as u64,
        }
    }

    pub fn named(type_tag: impl Into<String>, value: TypedValue) -> Self {
        TypedValue::Named {
            type_tag: type_tag.into(),
            value: Box::new(value),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            TypedValue::Nil => "nil".to_string(),
            TypedValue::Bool(_) => "bool".to_string(),
            TypedValue::String(_) => "string".to_string(),
            TypedValue::Int { ty, .. } => ty.name().to_string(),
            TypedValue::Uint { ty, .. } => ty.name().to_string(),
            TypedValue::Bytes(_) => "[]byte".to_string(),
            TypedValue::ByteArray(bz) => format!("[{}]byte", bz.len()),
            TypedValue::Named { type_tag, .. } | TypedValue::Struct { type_tag, .. } => {
                type_tag.clone()
            }
            TypedValue::Slice { elem_type, .. } => format!("[]{}", elem_type),
            TypedValue::Pointer(inner) => format!("*{}", inner.type_name()),
        }
    }

    /// Struct values and pointers to structs
    pub fn is_struct_like(&self) -> bool {
        match self {
            TypedValue::Struct { .. } => true,
            TypedValue::Pointer(inner) => matches!(**inner, TypedValue::Struct { .. }),
            _ => false,
        }
    }

    /// Strip pointers and declared types down to the underlying value
    pub fn underlying(&self) -> &TypedValue {
        match self {
            TypedValue::Named { value, .. } => value.underlying(),
            TypedValue::Pointer(inner) => inner.underlying(),
            other => other,
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypedValue> {
        match self.underlying() {
            TypedValue::Struct { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// The value without its type
    pub fn render_value(&self) -> String {
        match self {
            TypedValue::Nil => "nil".to_string(),
            TypedValue::Bool(b) => b.to_string(),
            TypedValue::String(s) => format!("{:?}", s),
            TypedValue::Int { value, .. } => value.to_string(),
            TypedValue::Uint { value, .. } => value.to_string(),
            TypedValue::Bytes(bz) | TypedValue::ByteArray(bz) => format!("0x{}", hex::encode(bz)),
            TypedValue::Named { value, .. } => value.render_value(),
            TypedValue::Struct { fields, .. } => {
                let fields: Vec<String> = fields.iter().map(|(_, v)| v.to_string()).collect();
                format!("struct{{{}}}", fields.join(","))
            }
            TypedValue::Slice { items, .. } => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                format!("slice[{}]", items.join(","))
            }
            TypedValue::Pointer(inner) => format!("&{}", inner),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypedValue::Nil => write!(f, "(nil)"),
            other => write!(f, "({} {})", other.render_value(), other.type_name()),
        }
    }
}

/// A named parameter or result of a function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedType {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
}

impl NamedType {
    /// Unnamed entries are reported as `_`
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() { "_".to_string() } else { name },
            ty: ty.into(),
        }
    }
}

/// Declared signature of a package-level function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    #[serde(rename = "FuncName")]
    pub func_name: String,
    #[serde(rename = "Params")]
    pub params: Vec<NamedType>,
    #[serde(rename = "Results")]
    pub results: Vec<NamedType>,
    /// Receiver type for methods
    #[serde(skip)]
    pub receiver: Option<String>,
}

impl FunctionSignature {
    pub fn is_exported(&self) -> bool {
        self.func_name
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
    }
}

/// Host state visible to code running inside the machine
#[derive(Clone)]
pub struct ExecContext {
    pub chain_id: String,
    pub height: i64,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub orig_caller: Address,
    pub orig_send: Coins,
    /// Running total moved through the orig-send banker in this call
    pub orig_send_spent: Arc<Mutex<Coins>>,
    pub orig_pkg_addr: Address,
    pub banker: Arc<dyn Banker>,
}

impl ExecContext {
    /// Banker of the requested kind layered over the context's banker
    pub fn get_banker(&self, ty: BankerType) -> Arc<dyn Banker> {
        match ty {
            BankerType::Readonly => Arc::new(ReadonlyBanker::new(self.banker.clone())),
            BankerType::OrigSend => Arc::new(OrigSendBanker::new(
                self.banker.clone(),
                self.orig_pkg_addr,
                self.orig_send.clone(),
                self.orig_send_spent.clone(),
            )),
            BankerType::RealmSend => {
                Arc::new(RealmSendBanker::new(self.banker.clone(), self.orig_pkg_addr))
            }
            BankerType::RealmIssue => self.banker.clone(),
        }
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("chain_id", &self.chain_id)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("orig_caller", &self.orig_caller)
            .field("orig_send", &self.orig_send)
            .field("orig_send_spent", &*self.orig_send_spent.lock())
            .field("orig_pkg_addr", &self.orig_pkg_addr)
            .finish_non_exhaustive()
    }
}

/// Everything a fresh machine is built with
#[derive(Clone)]
pub struct MachineOptions {
    /// Package the machine runs in
    pub pkg_path: String,
    pub context: ExecContext,
    pub natives: Arc<NativeRegistry>,
    /// Source of imported packages
    pub store: PackageStore,
}

/// One isolated machine instance. Implementations may panic on runtime
/// errors of the code they run; callers go through [`crate::Wrapper`].
pub trait Machine {
    /// Load and initialise a package
    fn run_mem_package(&mut self, pkg: &MemPackage) -> VmResult<()>;

    /// Call a package-level function
    fn call(&mut self, func: &str, args: Vec<TypedValue>) -> VmResult<Vec<TypedValue>>;

    /// Evaluate an expression in the package scope
    fn eval(&mut self, expr: &str) -> VmResult<Vec<TypedValue>>;

    /// Current call stack, for panic reports
    fn stacktrace(&self) -> String;
}

/// Builds machines and inspects package sources
pub trait MachineFactory: Send + Sync {
    fn new_machine(&self, options: MachineOptions) -> Box<dyn Machine>;

    /// Signatures of every function and method declared in `pkg`
    fn function_signatures(&self, pkg: &MemPackage) -> VmResult<Vec<FunctionSignature>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TypedValue::int(42).to_string(), "(42 int)");
        assert_eq!(TypedValue::string("hi").to_string(), "(\"hi\" string)");
        assert_eq!(TypedValue::Bool(true).to_string(), "(true bool)");
        assert_eq!(TypedValue::Nil.to_string(), "(nil)");
        assert_eq!(
            TypedValue::named("std.Address", TypedValue::string("0xab")).to_string(),
            "(\"0xab\" std.Address)"
        );
        assert_eq!(
            TypedValue::Slice {
                elem_type: "int".to_string(),
                items: vec![TypedValue::int(1), TypedValue::int(2)],
            }
            .to_string(),
            "(slice[(1 int),(2 int)] []int)"
        );
        assert_eq!(
            TypedValue::ByteArray(vec![0xab, 0x01]).to_string(),
            "(0xab01 [2]byte)"
        );
    }

    #[test]
    fn test_struct_like() {
        let st = TypedValue::Struct {
            type_tag: "demo.Point".to_string(),
            fields: vec![("X".to_string(), TypedValue::int(1))],
        };
        assert!(st.is_struct_like());
        assert!(TypedValue::Pointer(Box::new(st.clone())).is_struct_like());
        assert!(!TypedValue::Pointer(Box::new(TypedValue::int(1))).is_struct_like());
        assert!(!TypedValue::named("demo.Point", st.clone()).is_struct_like());
        assert_eq!(
            TypedValue::Pointer(Box::new(st.clone())).type_name(),
            "*demo.Point"
        );
        assert_eq!(st.field("X"), Some(&TypedValue::int(1)));
        assert_eq!(st.field("Y"), None);
    }

    #[test]
    fn test_named_type_placeholder() {
        assert_eq!(NamedType::new("", "int").name, "_");
        assert_eq!(NamedType::new("n", "int").name, "n");
        let json = serde_json::to_string(&NamedType::new("n", "int")).unwrap();
        assert_eq!(json, r#"{"Name":"n","Type":"int"}"#);
    }
}
