//! Account storage

use chain_core::{Account, Address, Coins, Context, StdResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Account storage used by the ante handler and the bank keeper
pub trait AccountKeeper: Send + Sync {
    /// Build a new account with the next account number. It is not stored
    /// until passed to [`AccountKeeper::set_account`].
    fn new_account_with_address(&self, ctx: &Context, addr: Address) -> Account;

    /// Get account by address
    fn get_account(&self, ctx: &Context, addr: &Address) -> Option<Account>;

    /// Store account
    fn set_account(&self, ctx: &Context, acc: Account);

    /// Visit stored accounts in address order until `f` returns true
    fn iterate_accounts(&self, ctx: &Context, f: &mut dyn FnMut(&Account) -> bool);
}

/// The single coin-moving capability the ante handler needs for fees
pub trait CoinSender: Send + Sync {
    fn send_coins(&self, ctx: &Context, from: Address, to: Address, amt: &Coins) -> StdResult<()>;
}

#[derive(Debug, Clone, Default)]
struct AccountStore {
    accounts: BTreeMap<Address, Account>,
    next_account_number: u64,
}

/// Point-in-time copy of a [`MemoryAccountKeeper`], used to roll back a
/// failed transaction
#[derive(Debug, Clone)]
pub struct AccountSnapshot(AccountStore);

/// In-memory account keeper
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountKeeper {
    store: Arc<RwLock<AccountStore>>,
}

impl MemoryAccountKeeper {
    /// Create new empty keeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial accounts; account numbers continue after the
    /// highest one given
    pub fn with_accounts(accounts: Vec<Account>) -> Self {
        let next_account_number = accounts
            .iter()
            .map(|acc| acc.account_number + 1)
            .max()
            .unwrap_or(0);
        let accounts = accounts.into_iter().map(|acc| (acc.address, acc)).collect();
        Self {
            store: Arc::new(RwLock::new(AccountStore {
                accounts,
                next_account_number,
            })),
        }
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot(self.store.read().clone())
    }

    pub fn restore(&self, snapshot: AccountSnapshot) {
        *self.store.write() = snapshot.0;
    }

    /// All accounts ordered by address
    pub fn accounts(&self) -> Vec<Account> {
        self.store.read().accounts.values().cloned().collect()
    }
}

impl AccountKeeper for MemoryAccountKeeper {
    fn new_account_with_address(&self, _ctx: &Context, addr: Address) -> Account {
        let mut store = self.store.write();
        let number = store.next_account_number;
        store.next_account_number += 1;
        Account::new(addr, number)
    }

    fn get_account(&self, _ctx: &Context, addr: &Address) -> Option<Account> {
        self.store.read().accounts.get(addr).cloned()
    }

    fn set_account(&self, _ctx: &Context, acc: Account) {
        self.store.write().accounts.insert(acc.address, acc);
    }

    fn iterate_accounts(&self, _ctx: &Context, f: &mut dyn FnMut(&Account) -> bool) {
        let store = self.store.read();
        for acc in store.accounts.values() {
            if f(acc) {
                break;
            }
        }
    }
}
