//! Transaction envelope, fees and sign bytes

use crate::crypto::hex_bytes;
use crate::{Address, Coin, Gas, Msg, PubKey, StdError, StdResult};
use serde::{Deserialize, Serialize};

/// Upper bound on `Fee::gas_wanted`
pub const MAX_GAS_WANTED: Gas = (1 << 60) - 1;

/// Gas limit and the fee paid for it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fee {
    pub gas_wanted: Gas,
    pub gas_fee: Coin,
}

impl Fee {
    pub fn new(gas_wanted: Gas, gas_fee: Coin) -> Self {
        Self { gas_wanted, gas_fee }
    }
}

/// A signature and, on first use of the account, its public key
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub pub_key: Option<PubKey>,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// Signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    #[serde(rename = "msg")]
    pub msgs: Vec<Msg>,
    pub fee: Fee,
    pub signatures: Vec<Signature>,
    pub memo: String,
}

impl Tx {
    pub fn new(msgs: Vec<Msg>, fee: Fee, signatures: Vec<Signature>, memo: impl Into<String>) -> Self {
        Self {
            msgs,
            fee,
            signatures,
            memo: memo.into(),
        }
    }

    /// Required signers across all messages, de-duplicated in first-seen order
    pub fn signers(&self) -> Vec<Address> {
        let mut signers: Vec<Address> = Vec::new();
        for msg in &self.msgs {
            for addr in msg.signers() {
                if !signers.contains(&addr) {
                    signers.push(addr);
                }
            }
        }
        signers
    }

    /// Stateless checks on the envelope
    pub fn validate_basic(&self) -> StdResult<()> {
        if self.fee.gas_wanted > MAX_GAS_WANTED {
            return Err(StdError::GasOverflow(format!(
                "invalid gas supplied; {} > {}",
                self.fee.gas_wanted, MAX_GAS_WANTED
            )));
        }
        if self.fee.gas_fee.amount < 0 {
            return Err(StdError::InsufficientFee(format!(
                "invalid gas fee amount {}",
                self.fee.gas_fee
            )));
        }
        if self.signatures.is_empty() {
            return Err(StdError::NoSignatures);
        }
        let signers = self.signers();
        if self.signatures.len() != signers.len() {
            return Err(StdError::Unauthorized(format!(
                "wrong number of signers; expected {}, got {}",
                signers.len(),
                self.signatures.len()
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> StdResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StdError::Internal(e.to_string()))
    }

    pub fn decode(bz: &[u8]) -> StdResult<Self> {
        Ok(serde_json::from_slice(bz)?)
    }
}

/// Canonical document a signer commits to. Fields are kept in lexical order
/// so the JSON encoding is stable.
#[derive(Serialize)]
struct SignDoc<'a> {
    account_number: String,
    chain_id: &'a str,
    fee: &'a Fee,
    memo: &'a str,
    msgs: &'a [Msg],
    sequence: String,
}

/// Bytes to sign for a transaction from an account at `sequence`
pub fn sign_bytes(
    chain_id: &str,
    account_number: u64,
    sequence: u64,
    fee: &Fee,
    msgs: &[Msg],
    memo: &str,
) -> StdResult<Vec<u8>> {
    let doc = SignDoc {
        account_number: account_number.to_string(),
        chain_id,
        fee,
        memo,
        msgs,
        sequence: sequence.to_string(),
    };
    serde_json::to_vec(&doc).map_err(|e| StdError::Internal(e.to_string()))
}
