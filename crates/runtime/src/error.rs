//! Error types for the client core

use sharedlog_common::{AbortCause, Address, ServiceError, StreamId, TokenType};
use thiserror::Error;

/// Runtime error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The sequencer refused the transaction's token
    ///
    /// `address` is the conflicting address for conflict aborts and none
    /// for new-sequencer aborts.
    #[error("Transaction aborted: {cause}")]
    TransactionAborted {
        cause: AbortCause,
        address: Option<Address>,
    },

    #[error("Destination stream {0} already has entries")]
    DestinationExists(StreamId),

    /// Lost a write race; handled inside append and copy
    #[error("Address {0} has already been written")]
    Overwrite(Address),

    #[error("Token of type {0:?} cannot be written")]
    InvalidToken(TokenType),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    pub fn is_abort(&self) -> bool {
        matches!(self, RuntimeError::TransactionAborted { .. })
    }
}

impl From<ServiceError> for RuntimeError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Overwrite(address) => RuntimeError::Overwrite(address),
            ServiceError::InvalidRequest(msg) => RuntimeError::InvalidRequest(msg),
            ServiceError::Unavailable(msg) => RuntimeError::Unavailable(msg),
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
