//! Core ledger data structures and traits
//!
//! This crate provides the shared building blocks of the ledger:
//! - Coin and coin-set values with canonical ordering
//! - Addresses, public/private keys and multisignatures
//! - Messages, the transaction envelope and sign bytes
//! - Gas meters, the execution context and transaction results

pub mod account;
pub mod address;
pub mod coin;
pub mod context;
pub mod crypto;
pub mod error;
pub mod gas;
pub mod handler;
pub mod msg;
pub mod result;
pub mod tx;

// Re-export commonly used types
pub use account::*;
pub use address::*;
pub use coin::*;
pub use context::*;
pub use crypto::{
    BitArray, Multisignature, PrivKey, PubKey, PubKeyEd25519, PubKeyMultisigThreshold,
    PubKeySecp256k1,
};
pub use error::*;
pub use gas::*;
pub use handler::*;
pub use msg::*;
pub use result::*;
pub use tx::*;
