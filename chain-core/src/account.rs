//! Account model

use crate::{Address, Coins, PubKey};
use serde::{Deserialize, Serialize};

/// On-ledger account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub coins: Coins,
    /// Set on the first signed transaction
    pub pub_key: Option<PubKey>,
    pub account_number: u64,
    /// Number of signatures verified for this account
    pub sequence: u64,
}

impl Account {
    /// Create a new empty account
    pub fn new(address: Address, account_number: u64) -> Self {
        Self {
            address,
            account_number,
            ..Self::default()
        }
    }

    /// Create an account holding `coins`
    pub fn with_coins(address: Address, account_number: u64, coins: Coins) -> Self {
        Self {
            coins,
            ..Self::new(address, account_number)
        }
    }

    /// Increment sequence
    pub fn increment_sequence(&mut self) {
        self.sequence += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_coins;

    #[test]
    fn test_account_creation() {
        let addr = Address::new([3; 20]);
        let mut acc = Account::with_coins(addr, 4, parse_coins("10foo").unwrap());
        assert_eq!(acc.address, addr);
        assert_eq!(acc.account_number, 4);
        assert_eq!(acc.sequence, 0);
        assert!(acc.pub_key.is_none());
        acc.increment_sequence();
        assert_eq!(acc.sequence, 1);
    }
}
