//! Node configuration

use crate::{NodeError, NodeResult};
use chain_auth::Params;
use chain_core::{parse_gas_prices, Address, Coins, GasPrice};
use chain_vm::VmConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "CHAIN";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Account funded at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    #[serde(default)]
    pub coins: Coins,
}

/// Configuration of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub chain_id: String,
    /// Mempool fee floor, e.g. `"1ugnot/1000gas"`; empty accepts any fee
    pub min_gas_prices: String,
    /// Directive for the log filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Verify signatures of transactions at height zero
    pub verify_genesis_signatures: bool,
    pub auth: Params,
    pub vm: VmConfig,
    pub genesis: Vec<GenesisAccount>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: "dev".to_string(),
            min_gas_prices: String::new(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            verify_genesis_signatures: true,
            auth: Params::default(),
            vm: VmConfig::default(),
            genesis: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            ..Self::default()
        }
    }

    pub fn with_min_gas_prices(mut self, prices: impl Into<String>) -> Self {
        self.min_gas_prices = prices.into();
        self
    }

    pub fn with_genesis_account(mut self, address: Address, coins: Coins) -> Self {
        self.genesis.push(GenesisAccount { address, coins });
        self
    }

    pub fn with_vm(mut self, vm: VmConfig) -> Self {
        self.vm = vm;
        self
    }

    /// Load from a TOML file, then apply `CHAIN__*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text without environment overrides
    pub fn from_toml_str(toml_str: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| NodeError::Config(format!("Failed to parse node config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> NodeResult<String> {
        toml::to_string(self)
            .map_err(|e| NodeError::Config(format!("Failed to serialize node config: {}", e)))
    }

    /// Parsed mempool fee floor
    pub fn gas_prices(&self) -> NodeResult<Vec<GasPrice>> {
        if self.min_gas_prices.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(parse_gas_prices(&self.min_gas_prices)?)
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.chain_id.is_empty() {
            return Err(NodeError::Config("chain_id must not be empty".to_string()));
        }
        self.gas_prices()?;
        self.auth.validate()?;
        self.vm.validate()?;
        for account in &self.genesis {
            if account.address.is_zero() {
                return Err(NodeError::Config(
                    "genesis account with zero address".to_string(),
                ));
            }
            account.coins.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::parse_coins;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.gas_prices().unwrap().is_empty());
        assert_eq!(config.auth, Params::default());
    }

    #[test]
    fn test_from_toml_str() {
        let toml_str = r#"
            chain_id = "testnet"
            min_gas_prices = "1ugnot/1000gas"
            log_format = "json"

            [auth]
            tx_sig_limit = 3

            [[genesis]]
            address = "0101010101010101010101010101010101010101"
            coins = "100ugnot"
        "#;
        let config = NodeConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.chain_id, "testnet");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.auth.tx_sig_limit, 3);
        assert_eq!(config.auth.max_memo_characters, 256);
        assert_eq!(config.gas_prices().unwrap().len(), 1);
        assert_eq!(config.genesis[0].address, Address::new([1; 20]));
        assert_eq!(config.genesis[0].coins, parse_coins("100ugnot").unwrap());
    }

    #[test]
    fn test_invalid_config() {
        assert!(NodeConfig::new("").validate().is_err());
        assert!(NodeConfig::new("dev")
            .with_min_gas_prices("ugnot/gas")
            .validate()
            .is_err());
        assert!(NodeConfig::new("dev")
            .with_genesis_account(Address::default(), Coins::default())
            .validate()
            .is_err());
    }

    #[test]
    fn test_to_toml_and_back() {
        let config = NodeConfig::new("dev")
            .with_min_gas_prices("1ugnot/1000gas")
            .with_genesis_account(Address::new([2; 20]), parse_coins("5ugnot").unwrap());
        let parsed = NodeConfig::from_toml_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("node-config-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "chain_id = \"from-file\"").unwrap();
        drop(file);

        let config = NodeConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.chain_id, "from-file");
        assert_eq!(config.log_filter, "info");
    }
}
