//! Error types for replicated objects

use sharedlog_common::AbortCause;
use sharedlog_runtime::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid transaction state: {0}")]
    InvalidState(String),
}

impl ObjectError {
    /// Abort cause, if a transaction was refused by the sequencer
    pub fn abort_cause(&self) -> Option<AbortCause> {
        match self {
            ObjectError::Runtime(RuntimeError::TransactionAborted { cause, .. }) => Some(*cause),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ObjectError>;
