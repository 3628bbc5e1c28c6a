//! VM error types

use chain_core::StdError;
use thiserror::Error;

/// VM error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Ledger error raised while preparing or settling a call
    #[error(transparent)]
    Std(#[from] StdError),

    /// The machine panicked; carries its stack dump
    #[error("VM panic: {message}\n{stacktrace}")]
    Panic { message: String, stacktrace: String },

    /// A value could not be converted between host and machine
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Error reported by the machine itself
    #[error("machine error: {0}")]
    Machine(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl VmError {
    pub fn invalid_pkg_path(msg: impl Into<String>) -> Self {
        VmError::Std(StdError::InvalidPkgPath(msg.into()))
    }

    pub fn invalid_expr(msg: impl Into<String>) -> Self {
        VmError::Std(StdError::InvalidExpr(msg.into()))
    }
}

impl From<VmError> for StdError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::Std(err) => err,
            other => StdError::Internal(other.to_string()),
        }
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
