//! Error types shared by every ledger module

use thiserror::Error;

/// Standard ledger errors.
///
/// Each variant maps to a stable result code (see [`StdError::code`]) so that
/// clients can match on failures without parsing log text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StdError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("tx parse error: {0}")]
    TxDecode(String),

    #[error("invalid sequence: {0}")]
    InvalidSequence(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("unknown request: {0}")]
    UnknownRequest(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unknown address: {0}")]
    UnknownAddress(String),

    #[error("invalid pubkey: {0}")]
    InvalidPubKey(String),

    #[error("insufficient coins: {0}")]
    InsufficientCoins(String),

    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    /// Raised by a gas meter once consumption passes its limit.
    #[error("out of gas in location: {descriptor}")]
    OutOfGas { descriptor: String },

    #[error("memo too large: {0}")]
    MemoTooLarge(String),

    #[error("insufficient fee: {0}")]
    InsufficientFee(String),

    #[error("too many signatures: {0}")]
    TooManySignatures(String),

    #[error("no signatures supplied")]
    NoSignatures,

    #[error("gas overflow: {0}")]
    GasOverflow(String),

    #[error("no inputs to send transaction")]
    NoInputs,

    #[error("no outputs to send transaction")]
    NoOutputs,

    #[error("sum inputs != sum outputs")]
    InputOutputMismatch,

    #[error("invalid package path: {0}")]
    InvalidPkgPath(String),

    #[error("invalid expression: {0}")]
    InvalidExpr(String),
}

impl StdError {
    /// Stable result code reported alongside a failed transaction.
    pub fn code(&self) -> u32 {
        match self {
            StdError::Internal(_) => 1,
            StdError::TxDecode(_) => 2,
            StdError::InvalidSequence(_) => 3,
            StdError::Unauthorized(_) => 4,
            StdError::InsufficientFunds(_) => 5,
            StdError::UnknownRequest(_) => 6,
            StdError::InvalidAddress(_) => 7,
            StdError::UnknownAddress(_) => 8,
            StdError::InvalidPubKey(_) => 9,
            StdError::InsufficientCoins(_) => 10,
            StdError::InvalidCoins(_) => 11,
            StdError::OutOfGas { .. } => 12,
            StdError::MemoTooLarge(_) => 13,
            StdError::InsufficientFee(_) => 14,
            StdError::TooManySignatures(_) => 15,
            StdError::NoSignatures => 16,
            StdError::GasOverflow(_) => 17,
            StdError::NoInputs => 18,
            StdError::NoOutputs => 19,
            StdError::InputOutputMismatch => 20,
            StdError::InvalidPkgPath(_) => 21,
            StdError::InvalidExpr(_) => 22,
        }
    }

    /// Whether this error came from a gas meter running dry.
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self, StdError::OutOfGas { .. })
    }
}

impl From<serde_json::Error> for StdError {
    fn from(err: serde_json::Error) -> Self {
        StdError::TxDecode(err.to_string())
    }
}

/// Result type for ledger operations
pub type StdResult<T> = Result<T, StdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = vec![
            StdError::Internal(String::new()),
            StdError::TxDecode(String::new()),
            StdError::InvalidSequence(String::new()),
            StdError::Unauthorized(String::new()),
            StdError::InsufficientFunds(String::new()),
            StdError::UnknownRequest(String::new()),
            StdError::InvalidAddress(String::new()),
            StdError::UnknownAddress(String::new()),
            StdError::InvalidPubKey(String::new()),
            StdError::InsufficientCoins(String::new()),
            StdError::InvalidCoins(String::new()),
            StdError::OutOfGas { descriptor: String::new() },
            StdError::MemoTooLarge(String::new()),
            StdError::InsufficientFee(String::new()),
            StdError::TooManySignatures(String::new()),
            StdError::NoSignatures,
            StdError::GasOverflow(String::new()),
            StdError::NoInputs,
            StdError::NoOutputs,
            StdError::InputOutputMismatch,
            StdError::InvalidPkgPath(String::new()),
            StdError::InvalidExpr(String::new()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(StdError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_out_of_gas_detection() {
        let err = StdError::OutOfGas {
            descriptor: "txSize".to_string(),
        };
        assert!(err.is_out_of_gas());
        assert_eq!(err.to_string(), "out of gas in location: txSize");
        assert!(!StdError::NoSignatures.is_out_of_gas());
    }
}
