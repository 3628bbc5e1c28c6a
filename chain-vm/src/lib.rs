//! Package publishing and execution on an external virtual machine
//!
//! This crate provides the VM keeper and handler, the bankers exposed to
//! running code, the native `std` package and the host/machine value
//! conversions.

pub mod banker;
pub mod config;
pub mod convert;
pub mod error;
pub mod handler;
pub mod keeper;
pub mod machine;
pub mod natives;
pub mod store;
pub mod wrapper;

#[cfg(test)]
mod testing;

pub use banker::{
    Banker, BankerType, OrigSendBanker, ReadonlyBanker, RealmSendBanker, SdkBanker,
};
pub use config::VmConfig;
pub use convert::{convert_arg, convert_args, HostValue, NativeValue};
pub use error::{VmError, VmResult};
pub use handler::{parse_query_eval_data, VmHandler, ROUTE};
pub use keeper::{
    derive_pkg_addr, split_filepath, validate_new_pkg_path, VmKeeper, VmKeeperI,
};
pub use machine::{
    ExecContext, FunctionSignature, IntType, Machine, MachineFactory, MachineOptions, NamedType,
    TypedValue, UintType,
};
pub use natives::{NativeFunction, NativeRegistry, STD_PKG};
pub use store::{PackageSnapshot, PackageStore};
pub use wrapper::Wrapper;
