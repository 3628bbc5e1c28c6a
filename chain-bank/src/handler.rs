//! Bank message handler and queries

use crate::keeper::{BankKeeper, BankKeeperI, ViewKeeperI};
use chain_core::{
    Address, Context, Handler, Msg, MsgMultiSend, MsgSend, StdError, StdResult, TxResult,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Route of the bank module
pub const ROUTE: &str = "bank";

/// Query path for an account balance
pub const QUERY_BALANCES: &str = "balances";

/// Request body of the balances query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBalancesRequest {
    pub address: Address,
}

/// Handles bank messages
#[derive(Clone)]
pub struct BankHandler {
    bank: BankKeeper,
}

impl BankHandler {
    pub fn new(bank: BankKeeper) -> Self {
        Self { bank }
    }

    fn handle_msg_send(&self, ctx: &Context, msg: &MsgSend) -> StdResult<TxResult> {
        self.bank
            .send_coins(ctx, msg.from_address, msg.to_address, &msg.amount)?;
        info!("Bank send {} from {} to {}", msg.amount, msg.from_address, msg.to_address);
        Ok(TxResult::ok())
    }

    fn handle_msg_multi_send(&self, ctx: &Context, msg: &MsgMultiSend) -> StdResult<TxResult> {
        self.bank.input_output_coins(ctx, &msg.inputs, &msg.outputs)?;
        info!(
            "Bank multisend with {} inputs and {} outputs",
            msg.inputs.len(),
            msg.outputs.len()
        );
        Ok(TxResult::ok())
    }

    fn query_balances(&self, ctx: &Context, data: &[u8]) -> StdResult<Vec<u8>> {
        let req: QueryBalancesRequest = serde_json::from_slice(data)?;
        let coins = self.bank.get_coins(ctx, &req.address);
        serde_json::to_vec(&coins).map_err(|e| StdError::Internal(e.to_string()))
    }
}

impl Handler for BankHandler {
    fn process(&self, ctx: &Context, msg: &Msg) -> TxResult {
        let result = match msg {
            Msg::Send(msg) => self.handle_msg_send(ctx, msg),
            Msg::MultiSend(msg) => self.handle_msg_multi_send(ctx, msg),
            other => Err(StdError::UnknownRequest(format!(
                "unrecognized bank message type: {}",
                other.msg_type()
            ))),
        };
        result.unwrap_or_else(TxResult::from)
    }

    fn query(&self, ctx: &Context, path: &str, data: &[u8]) -> StdResult<Vec<u8>> {
        match path {
            QUERY_BALANCES => self.query_balances(ctx, data),
            _ => Err(StdError::UnknownRequest(format!(
                "unknown bank query endpoint {}",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_auth::MemoryAccountKeeper;
    use chain_core::{parse_coins, Coins, Input, MsgEval, Output, RunTxMode};
    use std::sync::Arc;

    fn setup() -> (BankHandler, BankKeeper, Context) {
        let bank = BankKeeper::new(Arc::new(MemoryAccountKeeper::new()));
        (
            BankHandler::new(bank.clone()),
            bank,
            Context::new(RunTxMode::Deliver, "test-chain", 1),
        )
    }

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    #[test]
    fn test_process_send() {
        let (handler, bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &parse_coins("10foo").unwrap()).unwrap();

        let msg = Msg::Send(MsgSend::new(addr(1), addr(2), parse_coins("4foo").unwrap()));
        assert!(handler.process(&ctx, &msg).is_ok());
        assert_eq!(bank.get_coins(&ctx, &addr(2)), parse_coins("4foo").unwrap());

        let too_much = Msg::Send(MsgSend::new(addr(1), addr(2), parse_coins("40foo").unwrap()));
        let res = handler.process(&ctx, &too_much);
        assert!(matches!(res.error, Some(StdError::InsufficientCoins(_))));
    }

    #[test]
    fn test_process_multi_send() {
        let (handler, bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &parse_coins("10foo").unwrap()).unwrap();
        let msg = Msg::MultiSend(MsgMultiSend {
            inputs: vec![Input::new(addr(1), parse_coins("6foo").unwrap())],
            outputs: vec![
                Output::new(addr(2), parse_coins("2foo").unwrap()),
                Output::new(addr(3), parse_coins("4foo").unwrap()),
            ],
        });
        assert!(handler.process(&ctx, &msg).is_ok());
        assert_eq!(bank.get_coins(&ctx, &addr(3)), parse_coins("4foo").unwrap());
    }

    #[test]
    fn test_wrong_route_is_unknown_request() {
        let (handler, _, ctx) = setup();
        let msg = Msg::Eval(MsgEval {
            caller: addr(1),
            send: Coins::default(),
            pkg_path: "gno.land/r/demo".to_string(),
            expr: "X".to_string(),
        });
        let res = handler.process(&ctx, &msg);
        assert!(matches!(res.error, Some(StdError::UnknownRequest(_))));
    }

    #[test]
    fn test_query_balances() {
        let (handler, bank, ctx) = setup();
        bank.set_coins(&ctx, addr(1), &parse_coins("100foo,300ugnot").unwrap())
            .unwrap();

        let req = serde_json::to_vec(&QueryBalancesRequest { address: addr(1) }).unwrap();
        let res = handler.query(&ctx, QUERY_BALANCES, &req).unwrap();
        assert_eq!(res, b"\"100foo,300ugnot\"".to_vec());

        assert!(matches!(
            handler.query(&ctx, "supply", &req),
            Err(StdError::UnknownRequest(_))
        ));
        assert!(handler.query(&ctx, QUERY_BALANCES, b"not json").is_err());
    }
}
