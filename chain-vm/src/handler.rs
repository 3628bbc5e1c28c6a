//! VM message handler and queries

use crate::keeper::{VmKeeper, VmKeeperI};
use crate::VmResult;
use chain_core::{Context, Handler, Msg, StdError, StdResult, TxResult};

/// Route of the VM module
pub const ROUTE: &str = "vm";

pub const QUERY_PACKAGE: &str = "package";
pub const QUERY_STORE: &str = "store";
pub const QUERY_EVAL: &str = "queryeval";
pub const QUERY_FUNCS: &str = "qfuncs";

/// Split `queryeval` data into package path and expression
pub fn parse_query_eval_data(data: &str) -> StdResult<(&str, &str)> {
    match data.split_once('\n') {
        Some((pkg_path, expr)) if !pkg_path.is_empty() => Ok((pkg_path, expr)),
        _ => Err(StdError::InvalidExpr(
            "expected <pkgpath>\\n<expression> in query input data".to_string(),
        )),
    }
}

fn query_str(data: &[u8]) -> StdResult<&str> {
    std::str::from_utf8(data)
        .map(str::trim_end)
        .map_err(|e| StdError::UnknownRequest(format!("query data is not utf-8: {}", e)))
}

/// Handles VM messages
#[derive(Clone)]
pub struct VmHandler {
    vm: VmKeeper,
}

impl VmHandler {
    pub fn new(vm: VmKeeper) -> Self {
        Self { vm }
    }

    fn process_msg(&self, ctx: &Context, msg: &Msg) -> VmResult<TxResult> {
        match msg {
            Msg::AddPackage(msg) => {
                self.vm.add_package(ctx, msg)?;
                Ok(TxResult::ok())
            }
            Msg::Call(msg) => {
                let res = self.vm.call(ctx, msg)?;
                Ok(TxResult::with_data(res.into_bytes()))
            }
            Msg::Eval(msg) => {
                let res = self.vm.eval(ctx, msg)?;
                Ok(TxResult::with_data(res.into_bytes()))
            }
            other => Err(StdError::UnknownRequest(format!(
                "unrecognized vm message type: {}",
                other.msg_type()
            ))
            .into()),
        }
    }
}

impl Handler for VmHandler {
    fn process(&self, ctx: &Context, msg: &Msg) -> TxResult {
        self.process_msg(ctx, msg)
            .unwrap_or_else(|err| TxResult::from(StdError::from(err)))
    }

    fn query(&self, ctx: &Context, path: &str, data: &[u8]) -> StdResult<Vec<u8>> {
        match path {
            QUERY_PACKAGE => {
                let pkg = self.vm.query_package(query_str(data)?)?;
                serde_json::to_vec(&pkg).map_err(|e| StdError::Internal(e.to_string()))
            }
            QUERY_STORE => Ok(self.vm.query_file(query_str(data)?)?.into_bytes()),
            QUERY_EVAL => {
                let data = std::str::from_utf8(data)
                    .map_err(|e| StdError::UnknownRequest(format!("query data is not utf-8: {}", e)))?;
                let (pkg_path, expr) = parse_query_eval_data(data)?;
                Ok(self.vm.query_eval(ctx, pkg_path, expr)?.into_bytes())
            }
            QUERY_FUNCS => {
                let funcs = self.vm.query_funcs(query_str(data)?)?;
                serde_json::to_vec(&funcs).map_err(|e| StdError::Internal(e.to_string()))
            }
            _ => Err(StdError::UnknownRequest(format!(
                "unknown vm query endpoint {}",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::testing::{demo_package, ScriptedFactory};
    use chain_auth::MemoryAccountKeeper;
    use chain_bank::BankKeeper;
    use chain_core::{
        parse_coins, Account, Address, Coins, MemPackage, MsgAddPackage, MsgCall, MsgSend,
        RunTxMode,
    };
    use std::sync::Arc;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn setup() -> (VmHandler, Context) {
        let ctx = Context::new(RunTxMode::Deliver, "test-chain", 3);
        let acck = Arc::new(MemoryAccountKeeper::with_accounts(vec![Account::with_coins(
            addr(1),
            0,
            parse_coins("100ugnot").unwrap(),
        )]));
        let bank = BankKeeper::new(acck.clone());
        let vmk = VmKeeper::new(acck, bank, Arc::new(ScriptedFactory), VmConfig::default());
        let handler = VmHandler::new(vmk);
        let add = Msg::AddPackage(MsgAddPackage {
            creator: addr(1),
            package: demo_package("gno.land/r/demo"),
            deposit: Coins::default(),
        });
        assert!(handler.process(&ctx, &add).is_ok());
        (handler, ctx)
    }

    #[test]
    fn test_parse_query_eval_data() {
        assert_eq!(
            parse_query_eval_data("gno.land/r/demo\nRender(\"\")").unwrap(),
            ("gno.land/r/demo", "Render(\"\")")
        );
        assert_eq!(
            parse_query_eval_data("gno.land/r/demo\na\nb").unwrap(),
            ("gno.land/r/demo", "a\nb")
        );
        assert!(parse_query_eval_data("gno.land/r/demo").is_err());
        assert!(parse_query_eval_data("\nX").is_err());
    }

    #[test]
    fn test_process_call() {
        let (handler, ctx) = setup();
        let msg = Msg::Call(MsgCall {
            caller: addr(1),
            send: Coins::default(),
            pkg_path: "gno.land/r/demo".to_string(),
            func: "Add".to_string(),
            args: vec!["1".to_string(), "2".to_string()],
        });
        let res = handler.process(&ctx, &msg);
        assert!(res.is_ok());
        assert_eq!(res.data, b"(3 int)".to_vec());
    }

    #[test]
    fn test_process_errors() {
        let (handler, ctx) = setup();
        let dup = Msg::AddPackage(MsgAddPackage {
            creator: addr(1),
            package: demo_package("gno.land/r/demo"),
            deposit: Coins::default(),
        });
        let res = handler.process(&ctx, &dup);
        assert!(matches!(res.error, Some(StdError::InvalidPkgPath(_))));

        let send = Msg::Send(MsgSend::new(addr(1), addr(2), Coins::default()));
        let res = handler.process(&ctx, &send);
        assert!(matches!(res.error, Some(StdError::UnknownRequest(_))));
    }

    #[test]
    fn test_queries() {
        let (handler, ctx) = setup();

        let pkg = handler.query(&ctx, QUERY_PACKAGE, b"gno.land/r/demo").unwrap();
        let pkg: MemPackage = serde_json::from_slice(&pkg).unwrap();
        assert_eq!(pkg.path, "gno.land/r/demo");

        let files = handler.query(&ctx, QUERY_STORE, b"gno.land/r/demo").unwrap();
        assert_eq!(files, b"README.md\ndemo.gno".to_vec());

        let res = handler
            .query(&ctx, QUERY_EVAL, b"gno.land/r/demo\nHeight()")
            .unwrap();
        assert_eq!(res, b"(3 int64)".to_vec());

        let funcs = handler.query(&ctx, QUERY_FUNCS, b"gno.land/r/demo").unwrap();
        let funcs: serde_json::Value = serde_json::from_slice(&funcs).unwrap();
        assert_eq!(funcs[0]["FuncName"], "Add");
        assert_eq!(funcs[0]["Params"][1]["Name"], "b");

        assert!(matches!(
            handler.query(&ctx, "doc", b""),
            Err(StdError::UnknownRequest(_))
        ));
        assert!(handler.query(&ctx, QUERY_EVAL, b"gno.land/r/demo").is_err());
    }
}
