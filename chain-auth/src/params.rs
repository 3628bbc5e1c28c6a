//! Auth module parameters

use chain_core::{Gas, StdError, StdResult};
use serde::{Deserialize, Serialize};

/// Limits and gas costs applied by the ante handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Longest accepted memo, in characters
    pub max_memo_characters: usize,
    /// Most signatures (leaf keys) a transaction may carry
    pub tx_sig_limit: usize,
    /// Gas charged per byte of encoded transaction
    pub tx_size_cost_per_byte: Gas,
    pub sig_verify_cost_ed25519: Gas,
    pub sig_verify_cost_secp256k1: Gas,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_memo_characters: 256,
            tx_sig_limit: 7,
            tx_size_cost_per_byte: 10,
            sig_verify_cost_ed25519: 590,
            sig_verify_cost_secp256k1: 1000,
        }
    }
}

impl Params {
    /// Load params from TOML configuration
    pub fn from_toml(toml_str: &str) -> StdResult<Self> {
        let params: Self = toml::from_str(toml_str)
            .map_err(|e| StdError::Internal(format!("Failed to parse auth params: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> StdResult<String> {
        toml::to_string(self)
            .map_err(|e| StdError::Internal(format!("Failed to serialize auth params: {}", e)))
    }

    /// Every limit and cost must be positive
    pub fn validate(&self) -> StdResult<()> {
        let checks = [
            ("max_memo_characters", self.max_memo_characters as i64),
            ("tx_sig_limit", self.tx_sig_limit as i64),
            ("tx_size_cost_per_byte", self.tx_size_cost_per_byte),
            ("sig_verify_cost_ed25519", self.sig_verify_cost_ed25519),
            ("sig_verify_cost_secp256k1", self.sig_verify_cost_secp256k1),
        ];
        for (name, value) in checks {
            if value <= 0 {
                return Err(StdError::Internal(format!(
                    "invalid auth param {name}: {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Params::default();
        assert_eq!(params.max_memo_characters, 256);
        assert_eq!(params.tx_sig_limit, 7);
        assert_eq!(params.tx_size_cost_per_byte, 10);
        assert_eq!(params.sig_verify_cost_ed25519, 590);
        assert_eq!(params.sig_verify_cost_secp256k1, 1000);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides() {
        let params = Params::from_toml("tx_sig_limit = 3\n").unwrap();
        assert_eq!(params.tx_sig_limit, 3);
        assert_eq!(params.max_memo_characters, 256);

        let text = params.to_toml().unwrap();
        assert_eq!(Params::from_toml(&text).unwrap(), params);

        assert!(Params::from_toml("tx_size_cost_per_byte = 0\n").is_err());
    }
}
