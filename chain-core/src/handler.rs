//! Module message handlers

use crate::{Context, Msg, StdResult, TxResult};

/// Processes the messages and queries routed to one module
pub trait Handler: Send + Sync {
    /// Execute a message routed to this module
    fn process(&self, ctx: &Context, msg: &Msg) -> TxResult;

    /// Answer a query; `path` has the module route stripped
    fn query(&self, ctx: &Context, path: &str, data: &[u8]) -> StdResult<Vec<u8>>;
}
