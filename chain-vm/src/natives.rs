//! Natively implemented functions and types injected into the machine
//!
//! Machines resolve calls into `std` through [`NativeRegistry::call`] and
//! turn declared host types back into host values with
//! [`NativeRegistry::to_host`].

use crate::banker::BankerType;
use crate::convert::{HostValue, NativeValue};
use crate::keeper::derive_pkg_addr;
use crate::machine::{ExecContext, NamedType, TypedValue, UintType};
use crate::{VmError, VmResult};
use chain_core::{Address, Coin, Coins, PubKey};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::debug;

/// Package the standard natives live in
pub const STD_PKG: &str = "std";

pub const BANKER_TYPE: &str = "std.Banker";
pub const CONTEXT_TYPE: &str = "std.Context";

/// Native function body
pub type NativeFn = fn(&ExecContext, &[TypedValue]) -> VmResult<Vec<TypedValue>>;

/// Turns a machine value of one declared type into a host value
pub type FromVmFn = fn(&TypedValue) -> VmResult<HostValue>;

/// A natively implemented function with its declared signature
#[derive(Clone)]
pub struct NativeFunction {
    pub pkg_path: String,
    pub name: String,
    pub params: Vec<NamedType>,
    pub results: Vec<NamedType>,
    pub func: NativeFn,
}

/// Lookup table for native functions and host type conversions
#[derive(Clone, Default)]
pub struct NativeRegistry {
    functions: BTreeMap<(String, String), NativeFunction>,
    conversions: BTreeMap<&'static str, FromVmFn>,
}

fn params(list: &[(&str, &str)]) -> Vec<NamedType> {
    list.iter().map(|(name, ty)| NamedType::new(*name, *ty)).collect()
}

impl NativeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `std` package and its types
    pub fn with_std() -> Self {
        let mut registry = Self::new();
        registry.register_conversion(Address::TYPE_TAG, |tv| {
            Address::from_vm(tv).map(HostValue::Address)
        });
        registry.register_conversion(Coin::TYPE_TAG, |tv| Coin::from_vm(tv).map(HostValue::Coin));
        registry.register_conversion(Coins::TYPE_TAG, |tv| {
            Coins::from_vm(tv).map(HostValue::Coins)
        });
        registry.register_conversion(PubKey::TYPE_TAG, |tv| {
            PubKey::from_vm(tv).map(HostValue::PubKey)
        });
        register_std(&mut registry);
        registry
    }

    /// Register the conversion for one declared type
    pub fn register_conversion(&mut self, type_tag: &'static str, from_vm: FromVmFn) {
        self.conversions.insert(type_tag, from_vm);
    }

    pub fn register_function(
        &mut self,
        pkg_path: &str,
        name: &str,
        params: Vec<NamedType>,
        results: Vec<NamedType>,
        func: NativeFn,
    ) {
        self.functions.insert(
            (pkg_path.to_string(), name.to_string()),
            NativeFunction {
                pkg_path: pkg_path.to_string(),
                name: name.to_string(),
                params,
                results,
                func,
            },
        );
    }

    pub fn get_function(&self, pkg_path: &str, name: &str) -> Option<&NativeFunction> {
        self.functions.get(&(pkg_path.to_string(), name.to_string()))
    }

    /// Native functions of a package in name order
    pub fn functions_of<'a>(&'a self, pkg_path: &'a str) -> impl Iterator<Item = &'a NativeFunction> {
        self.functions
            .values()
            .filter(move |native| native.pkg_path == pkg_path)
    }

    /// Invoke a native function
    pub fn call(
        &self,
        ctx: &ExecContext,
        pkg_path: &str,
        name: &str,
        args: &[TypedValue],
    ) -> VmResult<Vec<TypedValue>> {
        let native = self.get_function(pkg_path, name).ok_or_else(|| {
            VmError::Machine(format!("undefined native function {}.{}", pkg_path, name))
        })?;
        if args.len() != native.params.len() {
            return Err(VmError::Machine(format!(
                "wrong number of arguments to {}.{}; expected {} got {}",
                pkg_path,
                name,
                native.params.len(),
                args.len()
            )));
        }
        debug!("Calling native {}.{}", pkg_path, name);
        (native.func)(ctx, args)
    }

    pub fn has_conversion(&self, type_tag: &str) -> bool {
        self.conversions.contains_key(type_tag)
    }

    /// Host value for a machine value of a registered type; `None` when the
    /// type has no host counterpart
    pub fn to_host(&self, tv: &TypedValue) -> Option<VmResult<HostValue>> {
        let tag = match tv {
            TypedValue::Pointer(inner) => inner.type_name(),
            other => other.type_name(),
        };
        self.conversions.get(tag.as_str()).map(|from_vm| from_vm(tv))
    }
}

fn banker_type_arg(tv: &TypedValue) -> VmResult<BankerType> {
    match tv.underlying() {
        TypedValue::Uint { value, .. } => BankerType::try_from(*value).map_err(VmError::Machine),
        _ => Err(VmError::Machine(format!(
            "expected banker, got {}",
            tv.type_name()
        ))),
    }
}

fn string_arg(tv: &TypedValue) -> VmResult<&str> {
    match tv.underlying() {
        TypedValue::String(s) => Ok(s),
        _ => Err(VmError::Machine(format!("expected string, got {}", tv.type_name()))),
    }
}

fn int_arg(tv: &TypedValue) -> VmResult<i64> {
    match tv.underlying() {
        TypedValue::Int { value, .. } => Ok(*value),
        _ => Err(VmError::Machine(format!("expected int64, got {}", tv.type_name()))),
    }
}

fn banker_handle(ty: BankerType) -> TypedValue {
    TypedValue::named(
        BANKER_TYPE,
        TypedValue::Uint {
            ty: UintType::Uint8,
            value: ty as u64,
        },
    )
}

fn native_hash(_ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let bz = match args[0].underlying() {
        TypedValue::Bytes(bz) => bz.as_slice(),
        TypedValue::Nil => &[],
        other => {
            return Err(VmError::Machine(format!(
                "expected []byte, got {}",
                other.type_name()
            )))
        }
    };
    let digest = Sha256::digest(bz);
    Ok(vec![TypedValue::ByteArray(digest[..20].to_vec())])
}

fn native_get_chain_id(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![TypedValue::string(ctx.chain_id.clone())])
}

fn native_get_height(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![TypedValue::int64(ctx.height)])
}

fn native_get_timestamp(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![TypedValue::int64(ctx.timestamp)])
}

fn native_get_orig_send(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![ctx.orig_send.to_vm()])
}

fn native_get_orig_caller(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![ctx.orig_caller.to_vm()])
}

fn native_get_orig_pkg_addr(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![ctx.orig_pkg_addr.to_vm()])
}

fn native_get_context(ctx: &ExecContext, _args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let spent = ctx.orig_send_spent.lock().clone();
    Ok(vec![TypedValue::Struct {
        type_tag: CONTEXT_TYPE.to_string(),
        fields: vec![
            ("ChainID".to_string(), TypedValue::string(ctx.chain_id.clone())),
            ("Height".to_string(), TypedValue::int64(ctx.height)),
            ("Timestamp".to_string(), TypedValue::int64(ctx.timestamp)),
            ("OrigCaller".to_string(), ctx.orig_caller.to_vm()),
            ("OrigSend".to_string(), ctx.orig_send.to_vm()),
            ("OrigSendSpent".to_string(), spent.to_vm()),
            ("OrigPkgAddr".to_string(), ctx.orig_pkg_addr.to_vm()),
        ],
    }])
}

fn native_derive_pkg_addr(_ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![derive_pkg_addr(string_arg(&args[0])?).to_vm()])
}

fn native_get_banker(_ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    Ok(vec![banker_handle(banker_type_arg(&args[0])?)])
}

/// Send from the package address, capped by the coins sent with the call
fn native_send(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let to = Address::from_vm(&args[0])?;
    let amt = Coins::from_vm(&args[1])?;
    ctx.get_banker(BankerType::OrigSend)
        .send_coins(ctx.orig_pkg_addr, to, &amt);
    Ok(vec![])
}

fn native_banker_get_coins(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let banker = ctx.get_banker(banker_type_arg(&args[0])?);
    let addr = Address::from_vm(&args[1])?;
    Ok(vec![banker.get_coins(&addr).to_vm()])
}

fn native_banker_send_coins(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let banker = ctx.get_banker(banker_type_arg(&args[0])?);
    let from = Address::from_vm(&args[1])?;
    let to = Address::from_vm(&args[2])?;
    let amt = Coins::from_vm(&args[3])?;
    banker.send_coins(from, to, &amt);
    Ok(vec![])
}

fn native_banker_total_coin(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let banker = ctx.get_banker(banker_type_arg(&args[0])?);
    let denom = string_arg(&args[1])?;
    Ok(vec![TypedValue::int64(banker.total_coin(denom))])
}

fn native_banker_issue_coin(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let banker = ctx.get_banker(banker_type_arg(&args[0])?);
    let addr = Address::from_vm(&args[1])?;
    banker.issue_coin(addr, string_arg(&args[2])?, int_arg(&args[3])?);
    Ok(vec![])
}

fn native_banker_remove_coin(ctx: &ExecContext, args: &[TypedValue]) -> VmResult<Vec<TypedValue>> {
    let banker = ctx.get_banker(banker_type_arg(&args[0])?);
    let addr = Address::from_vm(&args[1])?;
    banker.remove_coin(addr, string_arg(&args[2])?, int_arg(&args[3])?);
    Ok(vec![])
}

fn register_std(registry: &mut NativeRegistry) {
    registry.register_function(
        STD_PKG,
        "Hash",
        params(&[("bz", "[]byte")]),
        params(&[("hash", "[20]byte")]),
        native_hash,
    );
    registry.register_function(STD_PKG, "GetChainID", vec![], params(&[("", "string")]), native_get_chain_id);
    registry.register_function(STD_PKG, "GetHeight", vec![], params(&[("", "int64")]), native_get_height);
    registry.register_function(STD_PKG, "GetTimestamp", vec![], params(&[("", "int64")]), native_get_timestamp);
    registry.register_function(STD_PKG, "GetOrigSend", vec![], params(&[("", "std.Coins")]), native_get_orig_send);
    registry.register_function(STD_PKG, "GetOrigCaller", vec![], params(&[("", "std.Address")]), native_get_orig_caller);
    registry.register_function(
        STD_PKG,
        "GetOrigPkgAddr",
        vec![],
        params(&[("", "std.Address")]),
        native_get_orig_pkg_addr,
    );
    registry.register_function(STD_PKG, "GetContext", vec![], params(&[("", CONTEXT_TYPE)]), native_get_context);
    registry.register_function(
        STD_PKG,
        "DerivePkgAddr",
        params(&[("pkgPath", "string")]),
        params(&[("addr", "std.Address")]),
        native_derive_pkg_addr,
    );
    registry.register_function(
        STD_PKG,
        "GetBanker",
        params(&[("bankerType", "std.BankerType")]),
        params(&[("", BANKER_TYPE)]),
        native_get_banker,
    );
    registry.register_function(
        STD_PKG,
        "Send",
        params(&[("to", "std.Address"), ("coins", "std.Coins")]),
        vec![],
        native_send,
    );
    registry.register_function(
        STD_PKG,
        "Banker.GetCoins",
        params(&[("b", BANKER_TYPE), ("addr", "std.Address")]),
        params(&[("dst", "std.Coins")]),
        native_banker_get_coins,
    );
    registry.register_function(
        STD_PKG,
        "Banker.SendCoins",
        params(&[
            ("b", BANKER_TYPE),
            ("from", "std.Address"),
            ("to", "std.Address"),
            ("amt", "std.Coins"),
        ]),
        vec![],
        native_banker_send_coins,
    );
    registry.register_function(
        STD_PKG,
        "Banker.TotalCoin",
        params(&[("b", BANKER_TYPE), ("denom", "string")]),
        params(&[("", "int64")]),
        native_banker_total_coin,
    );
    registry.register_function(
        STD_PKG,
        "Banker.IssueCoin",
        params(&[
            ("b", BANKER_TYPE),
            ("addr", "std.Address"),
            ("denom", "string"),
            ("amount", "int64"),
        ]),
        vec![],
        native_banker_issue_coin,
    );
    registry.register_function(
        STD_PKG,
        "Banker.RemoveCoin",
        params(&[
            ("b", BANKER_TYPE),
            ("addr", "std.Address"),
            ("denom", "string"),
            ("amount", "int64"),
        ]),
        vec![],
        native_banker_remove_coin,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banker::{Banker, SdkBanker};
    use chain_auth::MemoryAccountKeeper;
    use chain_bank::{BankKeeper, BankKeeperI, ViewKeeperI};
    use chain_core::{parse_coins, Context, RunTxMode};
    use parking_lot::Mutex;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::Arc;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn setup() -> (NativeRegistry, ExecContext, BankKeeper, Context) {
        let ctx = Context::new(RunTxMode::Deliver, "test-chain", 7);
        let bank = BankKeeper::new(Arc::new(MemoryAccountKeeper::new()));
        bank.set_coins(&ctx, addr(9), &parse_coins("10ugnot").unwrap())
            .unwrap();
        let banker: Arc<dyn Banker> = Arc::new(SdkBanker::new(ctx.clone(), bank.clone()));
        let exec = ExecContext {
            chain_id: "test-chain".to_string(),
            height: 7,
            timestamp: 1_700_000_000,
            orig_caller: addr(1),
            orig_send: parse_coins("4ugnot").unwrap(),
            orig_send_spent: Arc::new(Mutex::new(Coins::default())),
            orig_pkg_addr: addr(9),
            banker,
        };
        (NativeRegistry::with_std(), exec, bank, ctx)
    }

    #[test]
    fn test_context_natives() {
        let (registry, exec, _, _) = setup();
        assert_eq!(
            registry.call(&exec, STD_PKG, "GetHeight", &[]).unwrap(),
            vec![TypedValue::int64(7)]
        );
        assert_eq!(
            registry.call(&exec, STD_PKG, "GetOrigCaller", &[]).unwrap(),
            vec![addr(1).to_vm()]
        );
        let ctx = registry.call(&exec, STD_PKG, "GetContext", &[]).unwrap();
        assert_eq!(ctx[0].field("ChainID"), Some(&TypedValue::string("test-chain")));
        assert_eq!(ctx[0].field("OrigPkgAddr"), Some(&addr(9).to_vm()));
    }

    #[test]
    fn test_hash_and_derive() {
        let (registry, exec, _, _) = setup();
        let hash = registry
            .call(&exec, STD_PKG, "Hash", &[TypedValue::Bytes(b"abc".to_vec())])
            .unwrap();
        assert_eq!(hash[0], TypedValue::ByteArray(Sha256::digest(b"abc")[..20].to_vec()));

        let derived = registry
            .call(&exec, STD_PKG, "DerivePkgAddr", &[TypedValue::string("gno.land/r/demo")])
            .unwrap();
        assert_eq!(derived[0], derive_pkg_addr("gno.land/r/demo").to_vm());
    }

    #[test]
    fn test_unknown_and_arity() {
        let (registry, exec, _, _) = setup();
        assert!(registry.call(&exec, STD_PKG, "Nope", &[]).is_err());
        assert!(registry.call(&exec, STD_PKG, "Hash", &[]).is_err());
        assert!(registry.get_function("other", "Hash").is_none());
        assert!(registry.functions_of(STD_PKG).any(|f| f.name == "GetBanker"));
    }

    #[test]
    fn test_send_is_capped_by_orig_send() {
        let (registry, exec, bank, ctx) = setup();
        let args = [addr(2).to_vm(), parse_coins("3ugnot").unwrap().to_vm()];
        registry.call(&exec, STD_PKG, "Send", &args).unwrap();
        assert_eq!(bank.get_coins(&ctx, &addr(2)), parse_coins("3ugnot").unwrap());
        assert_eq!(*exec.orig_send_spent.lock(), parse_coins("3ugnot").unwrap());

        let over = catch_unwind(AssertUnwindSafe(|| registry.call(&exec, STD_PKG, "Send", &args)));
        assert!(over.is_err());
        assert_eq!(*exec.orig_send_spent.lock(), parse_coins("3ugnot").unwrap());
    }

    #[test]
    fn test_banker_natives() {
        let (registry, exec, bank, ctx) = setup();
        let readonly = registry
            .call(&exec, STD_PKG, "GetBanker", &[TypedValue::uint8(0)])
            .unwrap()
            .remove(0);
        let coins = registry
            .call(&exec, STD_PKG, "Banker.GetCoins", &[readonly.clone(), addr(9).to_vm()])
            .unwrap();
        assert_eq!(coins[0], parse_coins("10ugnot").unwrap().to_vm());

        let send = [
            readonly,
            addr(9).to_vm(),
            addr(2).to_vm(),
            parse_coins("1ugnot").unwrap().to_vm(),
        ];
        let res = catch_unwind(AssertUnwindSafe(|| {
            registry.call(&exec, STD_PKG, "Banker.SendCoins", &send)
        }));
        assert!(res.is_err());

        let realm = registry
            .call(&exec, STD_PKG, "GetBanker", &[TypedValue::uint8(2)])
            .unwrap()
            .remove(0);
        let send = [
            realm,
            addr(9).to_vm(),
            addr(2).to_vm(),
            parse_coins("8ugnot").unwrap().to_vm(),
        ];
        registry.call(&exec, STD_PKG, "Banker.SendCoins", &send).unwrap();
        assert_eq!(bank.get_coins(&ctx, &addr(2)), parse_coins("8ugnot").unwrap());

        assert!(registry
            .call(&exec, STD_PKG, "GetBanker", &[TypedValue::uint8(9)])
            .is_err());
    }

    #[test]
    fn test_to_host() {
        let registry = NativeRegistry::with_std();
        let coin = Coin::new("ugnot", 5).to_vm();
        assert_eq!(
            registry.to_host(&coin).unwrap().unwrap(),
            HostValue::Coin(Coin::new("ugnot", 5))
        );
        assert_eq!(
            registry
                .to_host(&TypedValue::Pointer(Box::new(coin)))
                .unwrap()
                .unwrap(),
            HostValue::Coin(Coin::new("ugnot", 5))
        );
        assert!(registry.to_host(&TypedValue::int(1)).is_none());
        assert!(registry.has_conversion("std.Address"));
    }
}
