//! VM keeper: publishes packages and runs calls against them

use crate::banker::{Banker, ReadonlyBanker, SdkBanker};
use crate::config::VmConfig;
use crate::convert::convert_args;
use crate::machine::{ExecContext, FunctionSignature, MachineFactory, MachineOptions};
use crate::natives::NativeRegistry;
use crate::store::PackageStore;
use crate::wrapper::Wrapper;
use crate::{VmError, VmResult};
use chain_auth::AccountKeeper;
use chain_bank::{BankKeeper, BankKeeperI};
use chain_core::{
    Address, Coins, Context, MemPackage, MsgAddPackage, MsgCall, MsgEval, StdError,
};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

const REALM_PREFIX: &str = "gno.land/r/";
const PURE_PREFIX: &str = "gno.land/p/";

static REALM_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^gno.land/r/[a-z][a-z0-9_]+$").expect("valid realm path regex"));

// No end anchor: anything after a valid prefix is accepted.
static PURE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^gno.land/p/[a-z][a-z0-9_]+(?:/[a-z][a-z0-9_]*)*")
        .expect("valid package path regex")
});

/// Address holding the coins of a package
pub fn derive_pkg_addr(pkg_path: &str) -> Address {
    Address::from_preimage(format!("pkgPath:{}", pkg_path).as_bytes())
}

pub fn is_realm_path(pkg_path: &str) -> bool {
    pkg_path.starts_with(REALM_PREFIX)
}

/// Check the path of a package about to be published
pub fn validate_new_pkg_path(path: &str) -> VmResult<()> {
    if path.is_empty() {
        return Err(VmError::invalid_pkg_path("missing package path"));
    }
    let valid = if path.starts_with(REALM_PREFIX) {
        REALM_PATH_RE.is_match(path)
    } else if path.starts_with(PURE_PREFIX) {
        PURE_PATH_RE.is_match(path)
    } else {
        return Err(VmError::invalid_pkg_path(format!(
            "cannot create package invalid path {:?} (must start with '{}' or '{}')",
            path, REALM_PREFIX, PURE_PREFIX
        )));
    };
    if !valid {
        return Err(VmError::invalid_pkg_path(format!(
            "cannot create package with invalid path {:?}",
            path
        )));
    }
    Ok(())
}

/// Split a store query path into package path and file name. The file name
/// is empty when the path names a package.
pub fn split_filepath(filepath: &str) -> (&str, &str) {
    match filepath.rsplit_once('/') {
        Some((dir, last)) if last.contains('.') => (dir, last),
        _ => (filepath, ""),
    }
}

/// Message execution against the VM
pub trait VmKeeperI: Send + Sync {
    fn add_package(&self, ctx: &Context, msg: &MsgAddPackage) -> VmResult<()>;

    fn call(&self, ctx: &Context, msg: &MsgCall) -> VmResult<String>;

    fn eval(&self, ctx: &Context, msg: &MsgEval) -> VmResult<String>;
}

/// VM keeper over an external machine
#[derive(Clone)]
pub struct VmKeeper {
    acck: Arc<dyn AccountKeeper>,
    bank: BankKeeper,
    store: PackageStore,
    factory: Arc<dyn MachineFactory>,
    natives: Arc<NativeRegistry>,
    config: VmConfig,
}

impl VmKeeper {
    pub fn new(
        acck: Arc<dyn AccountKeeper>,
        bank: BankKeeper,
        factory: Arc<dyn MachineFactory>,
        config: VmConfig,
    ) -> Self {
        Self {
            acck,
            bank,
            store: PackageStore::new(),
            factory,
            natives: Arc::new(NativeRegistry::with_std()),
            config,
        }
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    fn get_package(&self, pkg_path: &str) -> VmResult<MemPackage> {
        self.store
            .get_package(pkg_path)
            .ok_or_else(|| VmError::invalid_pkg_path(format!("package not found: {}", pkg_path)))
    }

    fn charge_fee(&self, ctx: &Context, payer: Address, fee: &Coins) -> VmResult<()> {
        if fee.is_empty() {
            return Ok(());
        }
        self.bank
            .send_coins(ctx, payer, self.config.fee_collector, fee)?;
        debug!("Charged VM fee {} to {}", fee, payer);
        Ok(())
    }

    fn exec_context(
        &self,
        ctx: &Context,
        caller: Address,
        send: Coins,
        pkg_addr: Address,
        banker: Arc<dyn Banker>,
    ) -> ExecContext {
        ExecContext {
            chain_id: ctx.chain_id().to_string(),
            height: ctx.block_height(),
            timestamp: ctx.block_time(),
            orig_caller: caller,
            orig_send: send,
            orig_send_spent: Arc::new(Mutex::new(Coins::default())),
            orig_pkg_addr: pkg_addr,
            banker,
        }
    }

    fn wrapper(&self, pkg_path: &str, context: ExecContext) -> Wrapper {
        let machine = self.factory.new_machine(MachineOptions {
            pkg_path: pkg_path.to_string(),
            context,
            natives: self.natives.clone(),
            store: self.store.clone(),
        });
        Wrapper::new(machine, self.natives.clone())
    }

    fn sdk_banker(&self, ctx: &Context) -> Arc<dyn Banker> {
        Arc::new(SdkBanker::new(ctx.clone(), self.bank.clone()))
    }

    /// Exported package-level functions of a realm
    pub fn query_funcs(&self, pkg_path: &str) -> VmResult<Vec<FunctionSignature>> {
        if !is_realm_path(pkg_path) {
            return Err(VmError::invalid_pkg_path(format!(
                "package is not realm: {}",
                pkg_path
            )));
        }
        let pkg = self.get_package(pkg_path)?;
        let sigs = self.factory.function_signatures(&pkg)?;
        Ok(sigs
            .into_iter()
            .filter(|sig| sig.receiver.is_none() && sig.is_exported())
            .collect())
    }

    /// Evaluate an expression with a read-only banker
    pub fn query_eval(&self, ctx: &Context, pkg_path: &str, expr: &str) -> VmResult<String> {
        if expr.trim().is_empty() {
            return Err(VmError::invalid_expr("missing expression to evaluate"));
        }
        self.get_package(pkg_path)?;
        let banker: Arc<dyn Banker> = Arc::new(ReadonlyBanker::new(self.sdk_banker(ctx)));
        let context = self.exec_context(
            ctx,
            Address::zero(),
            Coins::default(),
            derive_pkg_addr(pkg_path),
            banker,
        );
        self.wrapper(pkg_path, context).eval(expr)
    }

    /// Body of a file, or the newline-joined file names of a package
    pub fn query_file(&self, filepath: &str) -> VmResult<String> {
        let (dirpath, filename) = split_filepath(filepath);
        let pkg = self.get_package(dirpath)?;
        if filename.is_empty() {
            let names: Vec<&str> = pkg.files.iter().map(|f| f.name.as_str()).collect();
            return Ok(names.join("\n"));
        }
        pkg.get_file(filename)
            .map(|file| file.body.clone())
            .ok_or_else(|| {
                VmError::invalid_pkg_path(format!("file not found: {}/{}", dirpath, filename))
            })
    }

    pub fn query_package(&self, pkg_path: &str) -> VmResult<MemPackage> {
        self.get_package(pkg_path)
    }
}

impl VmKeeperI for VmKeeper {
    fn add_package(&self, ctx: &Context, msg: &MsgAddPackage) -> VmResult<()> {
        let creator = msg.creator;
        let pkg = &msg.package;
        let pkg_path = pkg.path.as_str();

        if creator.is_zero() {
            return Err(StdError::InvalidAddress("missing creator address".to_string()).into());
        }
        if self.acck.get_account(ctx, &creator).is_none() {
            return Err(StdError::UnknownAddress(format!("account {} does not exist", creator)).into());
        }
        validate_new_pkg_path(pkg_path)?;
        if self.store.has_package(pkg_path) {
            return Err(VmError::invalid_pkg_path(format!(
                "package already exists: {}",
                pkg_path
            )));
        }

        self.charge_fee(ctx, creator, &self.config.publish_fee)?;
        let pkg_addr = derive_pkg_addr(pkg_path);
        self.bank.send_coins(ctx, creator, pkg_addr, &msg.deposit)?;

        let context = self.exec_context(
            ctx,
            creator,
            msg.deposit.clone(),
            pkg_addr,
            self.sdk_banker(ctx),
        );
        self.wrapper(pkg_path, context).run_mem_package(pkg)?;
        self.store.add_package(pkg.clone())?;
        info!("Added package {} by {}", pkg_path, creator);
        Ok(())
    }

    fn call(&self, ctx: &Context, msg: &MsgCall) -> VmResult<String> {
        let pkg = self.get_package(&msg.pkg_path)?;
        let sig = self
            .factory
            .function_signatures(&pkg)?
            .into_iter()
            .find(|sig| sig.receiver.is_none() && sig.func_name == msg.func)
            .ok_or_else(|| {
                VmError::invalid_expr(format!(
                    "function {} not found in {}",
                    msg.func, msg.pkg_path
                ))
            })?;
        let param_types: Vec<String> = sig.params.iter().map(|p| p.ty.clone()).collect();
        let args = convert_args(&msg.args, &param_types)?;

        self.charge_fee(ctx, msg.caller, &self.config.eval_fee)?;
        let pkg_addr = derive_pkg_addr(&msg.pkg_path);
        self.bank.send_coins(ctx, msg.caller, pkg_addr, &msg.send)?;

        let context = self.exec_context(
            ctx,
            msg.caller,
            msg.send.clone(),
            pkg_addr,
            self.sdk_banker(ctx),
        );
        let res = self.wrapper(&msg.pkg_path, context).call(&msg.func, args)?;
        info!("Called {}.{} by {}", msg.pkg_path, msg.func, msg.caller);
        Ok(res)
    }

    fn eval(&self, ctx: &Context, msg: &MsgEval) -> VmResult<String> {
        self.get_package(&msg.pkg_path)?;

        self.charge_fee(ctx, msg.caller, &self.config.eval_fee)?;
        let pkg_addr = derive_pkg_addr(&msg.pkg_path);
        self.bank.send_coins(ctx, msg.caller, pkg_addr, &msg.send)?;

        let context = self.exec_context(
            ctx,
            msg.caller,
            msg.send.clone(),
            pkg_addr,
            self.sdk_banker(ctx),
        );
        let res = self.wrapper(&msg.pkg_path, context).eval(&msg.expr)?;
        info!("Evaluated expression in {} by {}", msg.pkg_path, msg.caller);
        Ok(res)
    }
}
