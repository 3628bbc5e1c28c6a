//! Transaction results

use crate::{Gas, StdError};

/// Outcome of running a transaction, or one stage of it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxResult {
    pub error: Option<StdError>,
    pub log: String,
    pub data: Vec<u8>,
    pub gas_wanted: Gas,
    pub gas_used: Gas,
}

impl TxResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Result code; zero on success
    pub fn code(&self) -> u32 {
        self.error.as_ref().map_or(0, StdError::code)
    }
}

impl From<StdError> for TxResult {
    fn from(err: StdError) -> Self {
        Self {
            log: err.to_string(),
            error: Some(err),
            ..Self::default()
        }
    }
}
