//! Node error types

use chain_core::StdError;
use chain_vm::VmError;
use thiserror::Error;

/// Node error type
#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Std(#[from] StdError),

    #[error(transparent)]
    Vm(#[from] VmError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Genesis state could not be applied
    #[error("Genesis error: {0}")]
    Genesis(String),

    /// Logging setup failed
    #[error("Logging error: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for NodeError {
    fn from(err: config::ConfigError) -> Self {
        NodeError::Config(err.to_string())
    }
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
