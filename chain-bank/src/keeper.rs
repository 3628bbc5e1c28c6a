//! Balance reads and writes on top of the account keeper
//!
//! Every mutation is a read-modify-write through the [`AccountKeeper`]; a
//! rejected operation leaves the stored balance untouched. `send_coins` is
//! not atomic across its two legs, the enclosing transaction provides that.

use chain_auth::AccountKeeper;
use chain_core::{
    validate_inputs_outputs, Address, Coins, Context, Input, Output, StdError, StdResult,
};
use std::sync::Arc;
use tracing::debug;

/// Read-only balance access
pub trait ViewKeeperI: Send + Sync {
    /// Balance of `addr`; empty for unknown accounts
    fn get_coins(&self, ctx: &Context, addr: &Address) -> Coins;

    /// Whether `addr` holds at least `amt`
    fn has_coins(&self, ctx: &Context, addr: &Address, amt: &Coins) -> bool;
}

/// Balance mutation
pub trait BankKeeperI: ViewKeeperI {
    fn input_output_coins(&self, ctx: &Context, inputs: &[Input], outputs: &[Output]) -> StdResult<()>;

    fn send_coins(&self, ctx: &Context, from: Address, to: Address, amt: &Coins) -> StdResult<()>;

    fn subtract_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<Coins>;

    fn add_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<Coins>;

    fn set_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<()>;
}

/// Read-only view over account balances
#[derive(Clone)]
pub struct ViewKeeper {
    acck: Arc<dyn AccountKeeper>,
}

impl ViewKeeper {
    pub fn new(acck: Arc<dyn AccountKeeper>) -> Self {
        Self { acck }
    }
}

impl ViewKeeperI for ViewKeeper {
    fn get_coins(&self, ctx: &Context, addr: &Address) -> Coins {
        self.acck
            .get_account(ctx, addr)
            .map(|acc| acc.coins)
            .unwrap_or_default()
    }

    fn has_coins(&self, ctx: &Context, addr: &Address, amt: &Coins) -> bool {
        self.get_coins(ctx, addr).is_all_gte(amt)
    }
}

/// Balance keeper
#[derive(Clone)]
pub struct BankKeeper {
    view: ViewKeeper,
    acck: Arc<dyn AccountKeeper>,
}

impl BankKeeper {
    pub fn new(acck: Arc<dyn AccountKeeper>) -> Self {
        Self {
            view: ViewKeeper::new(acck.clone()),
            acck,
        }
    }

    /// Read-only view sharing the same account keeper
    pub fn view(&self) -> &ViewKeeper {
        &self.view
    }

    /// Sum of `denom` over every stored account
    pub fn total_coin(&self, ctx: &Context, denom: &str) -> i64 {
        let mut total: i64 = 0;
        self.acck.iterate_accounts(ctx, &mut |acc| {
            total = total
                .checked_add(acc.coins.amount_of(denom))
                .unwrap_or_else(|| panic!("total supply of {} overflows", denom));
            false
        });
        total
    }
}

impl ViewKeeperI for BankKeeper {
    fn get_coins(&self, ctx: &Context, addr: &Address) -> Coins {
        self.view.get_coins(ctx, addr)
    }

    fn has_coins(&self, ctx: &Context, addr: &Address, amt: &Coins) -> bool {
        self.view.has_coins(ctx, addr, amt)
    }
}

impl BankKeeperI for BankKeeper {
    fn input_output_coins(&self, ctx: &Context, inputs: &[Input], outputs: &[Output]) -> StdResult<()> {
        validate_inputs_outputs(inputs, outputs)?;

        for input in inputs {
            self.subtract_coins(ctx, input.address, &input.coins)?;
        }
        for output in outputs {
            self.add_coins(ctx, output.address, &output.coins)?;
        }
        Ok(())
    }

    fn send_coins(&self, ctx: &Context, from: Address, to: Address, amt: &Coins) -> StdResult<()> {
        self.subtract_coins(ctx, from, amt)?;
        self.add_coins(ctx, to, amt)?;
        debug!("Sent {} from {} to {}", amt, from, to);
        Ok(())
    }

    fn subtract_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<Coins> {
        if !amt.is_valid() {
            return Err(StdError::InvalidCoins(amt.to_string()));
        }

        let old_coins = self.get_coins(ctx, &addr);
        let new_coins = old_coins.sub_unsafe(amt);
        if !new_coins.is_valid() {
            return Err(StdError::InsufficientCoins(format!(
                "insufficient account funds; {} < {}",
                old_coins, amt
            )));
        }

        self.set_coins(ctx, addr, &new_coins)?;
        Ok(new_coins)
    }

    fn add_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<Coins> {
        if !amt.is_valid() {
            return Err(StdError::InvalidCoins(amt.to_string()));
        }

        let old_coins = self.get_coins(ctx, &addr);
        let new_coins = old_coins.add_unsafe(amt);
        if !new_coins.is_valid() {
            return Err(StdError::InsufficientCoins(format!(
                "insufficient account funds; {} < {}",
                old_coins, amt
            )));
        }

        self.set_coins(ctx, addr, &new_coins)?;
        Ok(new_coins)
    }

    fn set_coins(&self, ctx: &Context, addr: Address, amt: &Coins) -> StdResult<()> {
        if !amt.is_valid() {
            return Err(StdError::InvalidCoins(amt.to_string()));
        }

        let mut acc = self
            .acck
            .get_account(ctx, &addr)
            .unwrap_or_else(|| self.acck.new_account_with_address(ctx, addr));
        acc.coins = amt.clone();
        self.acck.set_account(ctx, acc);
        debug!("Set balance of {} to {}", addr, amt);
        Ok(())
    }
}

impl chain_auth::CoinSender for BankKeeper {
    fn send_coins(&self, ctx: &Context, from: Address, to: Address, amt: &Coins) -> StdResult<()> {
        BankKeeperI::send_coins(self, ctx, from, to, amt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_auth::MemoryAccountKeeper;
    use chain_core::{parse_coins, Coin, RunTxMode};
    use proptest::prelude::*;

    fn setup() -> (BankKeeper, Context) {
        let ak = MemoryAccountKeeper::new();
        (
            BankKeeper::new(Arc::new(ak)),
            Context::new(RunTxMode::Deliver, "test-chain", 1),
        )
    }

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn coins(s: &str) -> Coins {
        parse_coins(s).unwrap()
    }

    #[test]
    fn test_unknown_account_is_empty() {
        let (bank, ctx) = setup();
        assert!(bank.get_coins(&ctx, &addr(1)).is_empty());
        assert!(bank.has_coins(&ctx, &addr(1), &Coins::default()));
        assert!(!bank.has_coins(&ctx, &addr(1), &coins("1foo")));
    }

    #[test]
    fn test_send_moves_coins() {
        let (bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &coins("10foocoin")).unwrap();

        bank.send_coins(&ctx, addr(1), addr(2), &coins("5foocoin")).unwrap();
        assert_eq!(bank.get_coins(&ctx, &addr(1)), coins("5foocoin"));
        assert_eq!(bank.get_coins(&ctx, &addr(2)), coins("5foocoin"));
    }

    #[test]
    fn test_failed_send_changes_nothing() {
        let (bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &coins("10foocoin")).unwrap();

        let err = bank
            .send_coins(&ctx, addr(1), addr(2), &coins("50foocoin"))
            .unwrap_err();
        assert!(matches!(err, StdError::InsufficientCoins(_)));
        assert_eq!(bank.get_coins(&ctx, &addr(1)), coins("10foocoin"));
        assert!(bank.get_coins(&ctx, &addr(2)).is_empty());
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        let (bank, ctx) = setup();
        let negative = Coins::raw(vec![Coin {
            denom: "foo".into(),
            amount: -1,
        }]);
        assert!(matches!(
            bank.add_coins(&ctx, addr(1), &negative),
            Err(StdError::InvalidCoins(_))
        ));
        assert!(matches!(
            bank.set_coins(&ctx, addr(1), &negative),
            Err(StdError::InvalidCoins(_))
        ));
        let unsorted = Coins::raw(vec![Coin::new("zzz", 1), Coin::new("aaa", 1)]);
        assert!(matches!(
            bank.subtract_coins(&ctx, addr(1), &unsorted),
            Err(StdError::InvalidCoins(_))
        ));
    }

    #[test]
    fn test_subtract_to_zero_keeps_account() {
        let (bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &coins("3foo,4bar")).unwrap();
        let left = bank.subtract_coins(&ctx, addr(1), &coins("3foo")).unwrap();
        assert_eq!(left, coins("4bar"));
        let left = bank.subtract_coins(&ctx, addr(1), &coins("4bar")).unwrap();
        assert!(left.is_empty());
    }

    #[test]
    fn test_input_output_coins() {
        let (bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &coins("10foo")).unwrap();
        bank.set_coins(&ctx, addr(2), &coins("10foo")).unwrap();

        let inputs = vec![
            Input::new(addr(1), coins("3foo")),
            Input::new(addr(2), coins("7foo")),
        ];
        let outputs = vec![Output::new(addr(3), coins("10foo"))];
        bank.input_output_coins(&ctx, &inputs, &outputs).unwrap();
        assert_eq!(bank.get_coins(&ctx, &addr(1)), coins("7foo"));
        assert_eq!(bank.get_coins(&ctx, &addr(2)), coins("3foo"));
        assert_eq!(bank.get_coins(&ctx, &addr(3)), coins("10foo"));

        let unbalanced = vec![Output::new(addr(3), coins("9foo"))];
        assert_eq!(
            bank.input_output_coins(&ctx, &inputs, &unbalanced),
            Err(StdError::InputOutputMismatch)
        );
        assert_eq!(bank.get_coins(&ctx, &addr(1)), coins("7foo"));
    }

    #[test]
    fn test_total_coin() {
        let (bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &coins("10foo,3bar")).unwrap();
        bank.set_coins(&ctx, addr(2), &coins("5foo")).unwrap();
        assert_eq!(bank.total_coin(&ctx, "foo"), 15);
        assert_eq!(bank.total_coin(&ctx, "bar"), 3);
        assert_eq!(bank.total_coin(&ctx, "baz"), 0);
    }

    proptest! {
        #[test]
        fn prop_send_conserves_total(start in 0i64..1_000, amount in 1i64..2_000) {
            let (bank, ctx) = setup();
            if start > 0 {
                bank.set_coins(&ctx, addr(1), &Coins::new(vec![Coin::new("foo", start)])).unwrap();
            }
            let amt = Coins::new(vec![Coin::new("foo", amount)]);
            let result = bank.send_coins(&ctx, addr(1), addr(2), &amt);

            let from = bank.get_coins(&ctx, &addr(1)).amount_of("foo");
            let to = bank.get_coins(&ctx, &addr(2)).amount_of("foo");
            prop_assert_eq!(from + to, start);
            prop_assert_eq!(result.is_ok(), amount <= start);
            if result.is_err() {
                prop_assert_eq!(from, start);
            }
        }
    }
}
