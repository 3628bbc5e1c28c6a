//! Account storage and transaction authentication
//!
//! This crate provides the account keeper interface with an in-memory
//! implementation, the auth parameters and the ante handler that admits
//! transactions.

pub mod ante;
pub mod keeper;
pub mod params;

pub use ante::{
    default_sig_verification_gas_consumer, fee_collector_address, AnteHandler, AnteOptions,
    AnteOutcome, SignatureVerificationGasConsumer,
};
pub use keeper::{AccountKeeper, AccountSnapshot, CoinSender, MemoryAccountKeeper};
pub use params::Params;
