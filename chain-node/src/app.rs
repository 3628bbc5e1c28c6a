//! Application: keepers, routing and the transaction driver
//!
//! Every transaction runs against the live keepers, one at a time. The
//! driver snapshots the account and package stores first and restores them
//! when the state must not survive: an aborted ante handler, a failed
//! message in block execution, a panic anywhere in the transaction, and
//! always for mempool checks and simulations.

use crate::config::NodeConfig;
use crate::router::Router;
use crate::{NodeError, NodeResult};
use chain_auth::{
    default_sig_verification_gas_consumer, AccountKeeper, AccountSnapshot, AnteHandler,
    AnteOptions, MemoryAccountKeeper,
};
use chain_bank::{BankHandler, BankKeeper};
use chain_core::{
    Context, GasPrice, Handler, Msg, RunTxMode, StdError, StdResult, Tx, TxResult,
};
use chain_vm::{MachineFactory, PackageSnapshot, VmHandler, VmKeeper};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct StateSnapshot {
    accounts: AccountSnapshot,
    packages: PackageSnapshot,
}

/// A single-node ledger application
pub struct App {
    config: NodeConfig,
    gas_prices: Vec<GasPrice>,
    accounts: MemoryAccountKeeper,
    bank: BankKeeper,
    vm: VmKeeper,
    ante: AnteHandler,
    router: Router,
    /// Held for the whole of a transaction or query
    tx_lock: Mutex<()>,
    height: i64,
    time: i64,
}

impl App {
    /// Wire the keepers and handlers; `factory` provides the virtual machine
    pub fn new(config: NodeConfig, factory: Arc<dyn MachineFactory>) -> NodeResult<Self> {
        config.validate()?;
        let gas_prices = config.gas_prices()?;

        let accounts = MemoryAccountKeeper::new();
        let acck: Arc<dyn AccountKeeper> = Arc::new(accounts.clone());
        let bank = BankKeeper::new(acck.clone());
        let vm = VmKeeper::new(acck.clone(), bank.clone(), factory, config.vm.clone());
        let ante = AnteHandler::new(
            acck,
            Arc::new(bank.clone()),
            default_sig_verification_gas_consumer,
            AnteOptions {
                verify_genesis_signatures: config.verify_genesis_signatures,
                fee_collector: config.vm.fee_collector,
            },
        );

        let mut router = Router::new();
        router.add_route(chain_bank::ROUTE, Arc::new(BankHandler::new(bank.clone())))?;
        router.add_route(chain_vm::ROUTE, Arc::new(VmHandler::new(vm.clone())))?;

        Ok(Self {
            config,
            gas_prices,
            accounts,
            bank,
            vm,
            ante,
            router,
            tx_lock: Mutex::new(()),
            height: 0,
            time: 0,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn accounts(&self) -> &MemoryAccountKeeper {
        &self.accounts
    }

    pub fn bank(&self) -> &BankKeeper {
        &self.bank
    }

    pub fn vm(&self) -> &VmKeeper {
        &self.vm
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// Create the genesis accounts
    pub fn init_chain(&mut self) -> NodeResult<()> {
        let ctx = self.context(RunTxMode::Deliver);
        for genesis in &self.config.genesis {
            if self.accounts.get_account(&ctx, &genesis.address).is_some() {
                return Err(NodeError::Genesis(format!(
                    "duplicate genesis account {}",
                    genesis.address
                )));
            }
            let mut acc = self.accounts.new_account_with_address(&ctx, genesis.address);
            acc.coins = genesis.coins.clone();
            self.accounts.set_account(&ctx, acc);
            info!("Genesis account {} with {}", genesis.address, genesis.coins);
        }
        info!(
            "Initialized chain {} with {} accounts",
            self.config.chain_id,
            self.config.genesis.len()
        );
        Ok(())
    }

    /// Start a block; `time` is in seconds since the Unix epoch
    pub fn begin_block(&mut self, height: i64, time: i64) {
        self.height = height;
        self.time = time;
        debug!("Begin block {} at {}", height, time);
    }

    /// Mempool admission: runs the ante handler only and keeps no state
    pub fn check_tx(&self, tx_bytes: &[u8]) -> TxResult {
        self.run_tx(RunTxMode::Check, tx_bytes)
    }

    /// Block execution
    pub fn deliver_tx(&self, tx_bytes: &[u8]) -> TxResult {
        self.run_tx(RunTxMode::Deliver, tx_bytes)
    }

    /// Gas estimation: runs everything and keeps no state
    pub fn simulate(&self, tx_bytes: &[u8]) -> TxResult {
        self.run_tx(RunTxMode::Simulate, tx_bytes)
    }

    /// Answer a `<route>/<path>` query
    pub fn query(&self, path: &str, data: &[u8]) -> StdResult<Vec<u8>> {
        let _guard = self.tx_lock.lock();
        let (route, rest) = path.split_once('/').unwrap_or((path, ""));
        let handler = self
            .router
            .route(route)
            .ok_or_else(|| StdError::UnknownRequest(format!("unknown query path {}", path)))?;
        handler.query(&self.context(RunTxMode::Check), rest, data)
    }

    fn context(&self, mode: RunTxMode) -> Context {
        Context::new(mode, self.config.chain_id.clone(), self.height)
            .with_block_time(self.time)
            .with_min_gas_prices(self.gas_prices.clone())
            .with_value(self.config.auth.clone())
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            accounts: self.accounts.snapshot(),
            packages: self.vm.store().snapshot(),
        }
    }

    fn restore(&self, snapshot: StateSnapshot) {
        self.accounts.restore(snapshot.accounts);
        self.vm.store().restore(snapshot.packages);
    }

    fn run_tx(&self, mode: RunTxMode, tx_bytes: &[u8]) -> TxResult {
        let _guard = self.tx_lock.lock();
        let before_tx = self.snapshot();
        match catch_unwind(AssertUnwindSafe(|| self.execute_tx(mode, tx_bytes, &before_tx))) {
            Ok(result) => result,
            Err(payload) => {
                self.restore(before_tx);
                let message = panic_message(payload.as_ref());
                warn!("Recovered from panic in {:?} tx: {}", mode, message);
                StdError::Internal(format!("recovered: {}", message)).into()
            }
        }
    }

    fn execute_tx(&self, mode: RunTxMode, tx_bytes: &[u8], before_tx: &StateSnapshot) -> TxResult {
        let tx = match Tx::decode(tx_bytes) {
            Ok(tx) => tx,
            Err(err) => return err.into(),
        };
        if let Err(err) = validate_basic_tx_msgs(&tx.msgs) {
            return err.into();
        }

        let ctx = self.context(mode).with_tx_bytes(tx_bytes.to_vec());

        let outcome = self.ante.handle(&ctx, &tx, mode == RunTxMode::Simulate);
        if outcome.abort {
            self.restore(before_tx.clone());
            let mut result = outcome.result;
            result.gas_used = outcome.ctx.gas_consumed();
            return result;
        }
        let gas_wanted = outcome.result.gas_wanted;
        let ctx = outcome.ctx;

        let before_msgs = self.snapshot();
        let mut result = self.run_msgs(&ctx, &tx.msgs, mode);
        result.gas_wanted = gas_wanted;
        result.gas_used = ctx.gas_consumed();

        match mode {
            RunTxMode::Deliver if !result.is_ok() => self.restore(before_msgs),
            RunTxMode::Deliver => {}
            RunTxMode::Check | RunTxMode::Simulate => self.restore(before_tx.clone()),
        }
        debug!(
            "Ran tx in {:?} mode: code {}, gas {}/{}",
            mode,
            result.code(),
            result.gas_used,
            result.gas_wanted
        );
        result
    }

    /// Run messages in order, stopping at the first failure. Mempool checks
    /// only resolve the routes.
    fn run_msgs(&self, ctx: &Context, msgs: &[Msg], mode: RunTxMode) -> TxResult {
        let mut data = Vec::new();
        let mut logs = Vec::with_capacity(msgs.len());

        for (i, msg) in msgs.iter().enumerate() {
            let Some(handler) = self.router.route(msg.route()) else {
                return StdError::UnknownRequest(format!(
                    "unrecognized message type: {}",
                    msg.route()
                ))
                .into();
            };

            let res = if mode == RunTxMode::Check {
                TxResult::ok()
            } else {
                process_guarded(handler.as_ref(), ctx, msg)
            };

            data.extend_from_slice(&res.data);
            logs.push(format!("msg:{},success:{},log:{}", i, res.is_ok(), res.log));
            if let Some(err) = res.error {
                return TxResult {
                    error: Some(err),
                    log: logs.join("\n"),
                    data,
                    ..TxResult::default()
                };
            }
        }

        TxResult {
            log: logs.join("\n"),
            data,
            ..TxResult::default()
        }
    }
}

fn validate_basic_tx_msgs(msgs: &[Msg]) -> StdResult<()> {
    if msgs.is_empty() {
        return Err(StdError::UnknownRequest(
            "Tx.GetMsgs() must return at least one message in list".to_string(),
        ));
    }
    msgs.iter().try_for_each(Msg::validate_basic)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Process one message, reporting a handler panic as an internal error
fn process_guarded(handler: &dyn Handler, ctx: &Context, msg: &Msg) -> TxResult {
    match catch_unwind(AssertUnwindSafe(|| handler.process(ctx, msg))) {
        Ok(res) => res,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Recovered from panic in {} handler: {}", msg.route(), message);
            StdError::Internal(format!("recovered: {}", message)).into()
        }
    }
}
