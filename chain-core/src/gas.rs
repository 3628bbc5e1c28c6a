//! Gas metering and gas prices

use crate::{parse_coin, Coin, StdError, StdResult};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Gas amount type
pub type Gas = i64;

/// Tracks gas consumed by a single transaction
pub trait GasMeter: fmt::Debug + Send {
    /// Gas consumed so far
    fn gas_consumed(&self) -> Gas;

    /// Gas limit; zero for an unbounded meter
    fn limit(&self) -> Gas;

    /// Consume gas, failing with [`StdError::OutOfGas`] once past the limit.
    /// The consumption is recorded even when it overruns the limit.
    fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> StdResult<()>;

    fn is_past_limit(&self) -> bool;

    fn is_out_of_gas(&self) -> bool;

    /// Gas left before the limit
    fn remaining(&self) -> Gas {
        (self.limit() - self.gas_consumed()).max(0)
    }
}

fn add_gas(consumed: Gas, amount: Gas, descriptor: &str) -> StdResult<Gas> {
    consumed
        .checked_add(amount)
        .ok_or_else(|| StdError::GasOverflow(descriptor.to_string()))
}

/// Gas meter bounded by a limit
#[derive(Debug, Clone)]
pub struct BasicGasMeter {
    limit: Gas,
    consumed: Gas,
    /// Gas consumed per descriptor
    breakdown: HashMap<String, Gas>,
}

impl BasicGasMeter {
    pub fn new(limit: Gas) -> Self {
        Self {
            limit,
            consumed: 0,
            breakdown: HashMap::new(),
        }
    }

    /// Get gas consumption breakdown
    pub fn breakdown(&self) -> &HashMap<String, Gas> {
        &self.breakdown
    }
}

impl GasMeter for BasicGasMeter {
    fn gas_consumed(&self) -> Gas {
        self.consumed
    }

    fn limit(&self) -> Gas {
        self.limit
    }

    fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> StdResult<()> {
        self.consumed = add_gas(self.consumed, amount, descriptor)?;
        *self.breakdown.entry(descriptor.to_string()).or_insert(0) += amount;

        if self.consumed > self.limit {
            return Err(StdError::OutOfGas {
                descriptor: descriptor.to_string(),
            });
        }
        Ok(())
    }

    fn is_past_limit(&self) -> bool {
        self.consumed > self.limit
    }

    fn is_out_of_gas(&self) -> bool {
        self.consumed >= self.limit
    }
}

/// Gas meter without a limit, used for simulation and genesis
#[derive(Debug, Clone, Default)]
pub struct InfiniteGasMeter {
    consumed: Gas,
}

impl InfiniteGasMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GasMeter for InfiniteGasMeter {
    fn gas_consumed(&self) -> Gas {
        self.consumed
    }

    fn limit(&self) -> Gas {
        0
    }

    fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> StdResult<()> {
        self.consumed = add_gas(self.consumed, amount, descriptor)?;
        Ok(())
    }

    fn is_past_limit(&self) -> bool {
        false
    }

    fn is_out_of_gas(&self) -> bool {
        false
    }

    fn remaining(&self) -> Gas {
        Gas::MAX
    }
}

/// Price of `gas` units, written `"<price>/<gas>gas"`, e.g. `"1ugnot/1000gas"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPrice {
    pub gas: Gas,
    pub price: Coin,
}

impl GasPrice {
    pub fn new(gas: Gas, price: Coin) -> Self {
        Self { gas, price }
    }
}

impl fmt::Display for GasPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}gas", self.price, self.gas)
    }
}

impl FromStr for GasPrice {
    type Err = StdError;

    fn from_str(s: &str) -> StdResult<Self> {
        let (price, gas) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| StdError::InvalidCoins(format!("invalid gas price: {s}")))?;
        let price = parse_coin(price)?;
        let gas = parse_coin(gas)?;
        if gas.denom != "gas" {
            return Err(StdError::InvalidCoins(format!(
                "invalid gas price: {s} (invalid gas denom)"
            )));
        }
        if gas.amount == 0 {
            return Err(StdError::InvalidCoins(format!("invalid gas price: {s} (zero gas)")));
        }
        Ok(GasPrice::new(gas.amount, price))
    }
}

/// Parse `;` separated gas prices
pub fn parse_gas_prices(s: &str) -> StdResult<Vec<GasPrice>> {
    s.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(GasPrice::from_str)
        .collect()
}

impl Serialize for GasPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GasPrice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
