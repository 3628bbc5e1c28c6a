//! VM keeper configuration

use crate::{VmError, VmResult};
use chain_auth::fee_collector_address;
use chain_core::{Address, Coins};
use serde::{Deserialize, Serialize};

/// Fees charged by the VM keeper and where they go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Charged to the creator of every new package
    pub publish_fee: Coins,
    /// Charged to the caller of every call or eval
    pub eval_fee: Coins,
    /// Receiver of both fees
    pub fee_collector: Address,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            publish_fee: Coins::default(),
            eval_fee: Coins::default(),
            fee_collector: fee_collector_address(),
        }
    }
}

impl VmConfig {
    /// Load VM configuration from TOML
    pub fn from_toml(toml_str: &str) -> VmResult<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| VmError::Config(format!("Failed to parse VM config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> VmResult<String> {
        toml::to_string(self)
            .map_err(|e| VmError::Config(format!("Failed to serialize VM config: {}", e)))
    }

    pub fn validate(&self) -> VmResult<()> {
        self.publish_fee.validate()?;
        self.eval_fee.validate()?;
        if self.fee_collector.is_zero() {
            return Err(VmError::Config("fee collector must not be empty".to_string()));
        }
        Ok(())
    }
}
