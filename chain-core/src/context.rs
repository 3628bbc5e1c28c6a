//! Per-transaction execution context

use crate::{Gas, GasMeter, GasPrice, InfiniteGasMeter, StdResult};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Mode a transaction is run in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunTxMode {
    /// Mempool admission
    Check,
    /// Block execution
    Deliver,
    /// Gas estimation; state changes are discarded
    Simulate,
}

/// Gas meter handle shared by every clone of a [`Context`]
pub type SharedGasMeter = Arc<Mutex<Box<dyn GasMeter>>>;

/// Immutable execution context handed to handlers and keepers.
///
/// `with_*` methods return modified copies; the gas meter handle is shared
/// between copies until replaced.
#[derive(Debug, Clone)]
pub struct Context {
    mode: RunTxMode,
    chain_id: String,
    block_height: i64,
    /// Block time, seconds since the Unix epoch
    block_time: i64,
    tx_bytes: Arc<Vec<u8>>,
    min_gas_prices: Vec<GasPrice>,
    gas_meter: SharedGasMeter,
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    pub fn new(mode: RunTxMode, chain_id: impl Into<String>, block_height: i64) -> Self {
        Self {
            mode,
            chain_id: chain_id.into(),
            block_height,
            block_time: 0,
            tx_bytes: Arc::new(Vec::new()),
            min_gas_prices: Vec::new(),
            gas_meter: Arc::new(Mutex::new(Box::new(InfiniteGasMeter::new()))),
            values: Arc::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> RunTxMode {
        self.mode
    }

    /// True for mempool checks and simulations
    pub fn is_check_tx(&self) -> bool {
        matches!(self.mode, RunTxMode::Check | RunTxMode::Simulate)
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn block_height(&self) -> i64 {
        self.block_height
    }

    pub fn block_time(&self) -> i64 {
        self.block_time
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn min_gas_prices(&self) -> &[GasPrice] {
        &self.min_gas_prices
    }

    pub fn gas_meter(&self) -> &SharedGasMeter {
        &self.gas_meter
    }

    /// Typed value stored with [`Context::with_value`]
    pub fn value<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn with_mode(mut self, mode: RunTxMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_block_height(mut self, height: i64) -> Self {
        self.block_height = height;
        self
    }

    pub fn with_block_time(mut self, time: i64) -> Self {
        self.block_time = time;
        self
    }

    pub fn with_tx_bytes(mut self, tx_bytes: Vec<u8>) -> Self {
        self.tx_bytes = Arc::new(tx_bytes);
        self
    }

    pub fn with_min_gas_prices(mut self, prices: Vec<GasPrice>) -> Self {
        self.min_gas_prices = prices;
        self
    }

    /// Replace the gas meter with a fresh handle
    pub fn with_gas_meter(mut self, meter: impl GasMeter + 'static) -> Self {
        self.gas_meter = Arc::new(Mutex::new(Box::new(meter)));
        self
    }

    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<T>(), Arc::new(value));
        self.values = Arc::new(values);
        self
    }

    /// Consume gas on the context's meter
    pub fn consume_gas(&self, amount: Gas, descriptor: &str) -> StdResult<()> {
        self.gas_meter.lock().consume_gas(amount, descriptor)
    }

    pub fn gas_consumed(&self) -> Gas {
        self.gas_meter.lock().gas_consumed()
    }
}
