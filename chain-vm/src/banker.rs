//! Bankers handed to code running inside the machine
//!
//! Every banker delegates to the ledger through [`SdkBanker`]; the wrappers
//! only narrow what may be moved. Violations panic, which the machine turns
//! into a failed call.

use chain_bank::{BankKeeper, BankKeeperI, ViewKeeperI};
use chain_core::{Address, Coin, Coins, Context};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Ledger access from the machine
pub trait Banker: Send + Sync {
    fn get_coins(&self, addr: &Address) -> Coins;

    fn send_coins(&self, from: Address, to: Address, amt: &Coins);

    fn total_coin(&self, denom: &str) -> i64;

    fn issue_coin(&self, addr: Address, denom: &str, amount: i64);

    fn remove_coin(&self, addr: Address, denom: &str, amount: i64);
}

/// Banker kinds selectable from the machine with `GetBanker`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum BankerType {
    Readonly = 0,
    OrigSend = 1,
    RealmSend = 2,
    RealmIssue = 3,
}

impl TryFrom<u64> for BankerType {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BankerType::Readonly),
            1 => Ok(BankerType::OrigSend),
            2 => Ok(BankerType::RealmSend),
            3 => Ok(BankerType::RealmIssue),
            other => Err(format!("unknown banker type {}", other)),
        }
    }
}

impl fmt::Display for BankerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BankerType::Readonly => "readonly",
            BankerType::OrigSend => "orig-send",
            BankerType::RealmSend => "realm-send",
            BankerType::RealmIssue => "realm-issue",
        };
        f.write_str(name)
    }
}

/// Unrestricted banker over the bank keeper
#[derive(Clone)]
pub struct SdkBanker {
    ctx: Context,
    bank: BankKeeper,
}

impl SdkBanker {
    pub fn new(ctx: Context, bank: BankKeeper) -> Self {
        Self { ctx, bank }
    }
}

impl Banker for SdkBanker {
    fn get_coins(&self, addr: &Address) -> Coins {
        self.bank.get_coins(&self.ctx, addr)
    }

    fn send_coins(&self, from: Address, to: Address, amt: &Coins) {
        if let Err(err) = self.bank.send_coins(&self.ctx, from, to, amt) {
            panic!("{}", err);
        }
    }

    fn total_coin(&self, denom: &str) -> i64 {
        self.bank.total_coin(&self.ctx, denom)
    }

    fn issue_coin(&self, addr: Address, denom: &str, amount: i64) {
        let amt = Coins::from(Coin::new(denom, amount));
        if let Err(err) = self.bank.add_coins(&self.ctx, addr, &amt) {
            panic!("{}", err);
        }
        debug!("Issued {} to {}", amt, addr);
    }

    fn remove_coin(&self, addr: Address, denom: &str, amount: i64) {
        let amt = Coins::from(Coin::new(denom, amount));
        if let Err(err) = self.bank.subtract_coins(&self.ctx, addr, &amt) {
            panic!("{}", err);
        }
        debug!("Removed {} from {}", amt, addr);
    }
}

/// Read-only banker; any mutation panics
#[derive(Clone)]
pub struct ReadonlyBanker {
    banker: Arc<dyn Banker>,
}

impl ReadonlyBanker {
    pub fn new(banker: Arc<dyn Banker>) -> Self {
        Self { banker }
    }
}

impl Banker for ReadonlyBanker {
    fn get_coins(&self, addr: &Address) -> Coins {
        self.banker.get_coins(addr)
    }

    fn send_coins(&self, _from: Address, _to: Address, _amt: &Coins) {
        panic!("ReadonlyBanker cannot send coins");
    }

    fn total_coin(&self, denom: &str) -> i64 {
        self.banker.total_coin(denom)
    }

    fn issue_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("ReadonlyBanker cannot issue coins");
    }

    fn remove_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("ReadonlyBanker cannot remove coins");
    }
}

/// Sends from the package address, capped by the coins the transaction
/// attached to the call
#[derive(Clone)]
pub struct OrigSendBanker {
    banker: Arc<dyn Banker>,
    pkg_addr: Address,
    orig_send: Coins,
    orig_send_spent: Arc<Mutex<Coins>>,
}

impl OrigSendBanker {
    pub fn new(
        banker: Arc<dyn Banker>,
        pkg_addr: Address,
        orig_send: Coins,
        orig_send_spent: Arc<Mutex<Coins>>,
    ) -> Self {
        Self {
            banker,
            pkg_addr,
            orig_send,
            orig_send_spent,
        }
    }
}

impl Banker for OrigSendBanker {
    fn get_coins(&self, addr: &Address) -> Coins {
        self.banker.get_coins(addr)
    }

    fn send_coins(&self, from: Address, to: Address, amt: &Coins) {
        if from != self.pkg_addr {
            panic!(
                "OrigSendBanker can only send from the realm package address {}, but got {}",
                self.pkg_addr, from
            );
        }
        let mut spent_guard = self.orig_send_spent.lock();
        let spent = spent_guard.add(amt);
        if !self.orig_send.is_all_gte(&spent) {
            let already = spent_guard.to_string();
            drop(spent_guard);
            panic!(
                "cannot send {:?}, limit {:?} exceeded with {:?} already spent",
                amt.to_string(),
                self.orig_send.to_string(),
                already
            );
        }
        self.banker.send_coins(from, to, amt);
        *spent_guard = spent;
    }

    fn total_coin(&self, denom: &str) -> i64 {
        self.banker.total_coin(denom)
    }

    fn issue_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("OrigSendBanker cannot issue coins");
    }

    fn remove_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("OrigSendBanker cannot remove coins");
    }
}

/// Sends from the package address without a cap
#[derive(Clone)]
pub struct RealmSendBanker {
    banker: Arc<dyn Banker>,
    pkg_addr: Address,
}

impl RealmSendBanker {
    pub fn new(banker: Arc<dyn Banker>, pkg_addr: Address) -> Self {
        Self { banker, pkg_addr }
    }
}

impl Banker for RealmSendBanker {
    fn get_coins(&self, addr: &Address) -> Coins {
        self.banker.get_coins(addr)
    }

    fn send_coins(&self, from: Address, to: Address, amt: &Coins) {
        if from != self.pkg_addr {
            panic!(
                "RealmSendBanker can only send from the realm package address {}, but got {}",
                self.pkg_addr, from
            );
        }
        self.banker.send_coins(from, to, amt);
    }

    fn total_coin(&self, denom: &str) -> i64 {
        self.banker.total_coin(denom)
    }

    fn issue_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("RealmSendBanker cannot issue coins");
    }

    fn remove_coin(&self, _addr: Address, _denom: &str, _amount: i64) {
        panic!("RealmSendBanker cannot remove coins");
    }
}
