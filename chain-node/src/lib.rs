//! Application wiring for the ledger
//!
//! This crate loads the node configuration, installs logging, routes
//! messages and queries to the bank and VM modules and drives transactions
//! through the ante handler in check, deliver and simulate modes.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;

pub use app::App;
pub use config::{GenesisAccount, LogFormat, NodeConfig, ENV_PREFIX};
pub use error::{NodeError, NodeResult};
pub use router::Router;
