//! Multi-denomination balances
//!
//! This crate provides the view and bank keepers over account balances and
//! the handler for bank messages and queries.

pub mod handler;
pub mod keeper;

pub use handler::{BankHandler, QueryBalancesRequest, QUERY_BALANCES, ROUTE};
pub use keeper::{BankKeeper, BankKeeperI, ViewKeeper, ViewKeeperI};
