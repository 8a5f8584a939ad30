//! Error types for the supply chain core

use crate::types::BatchAction;
use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
///
/// Every operation returns one of these kinds; the HTTP layer maps them to
/// status codes. Background confirmation failures are logged, not returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input (surfaced with the first failing field's message)
    #[error("{0}")]
    Validation(String),

    /// Unknown batch/transaction/user
    #[error("{0} not found")]
    NotFound(String),

    /// Wrong role or non-owner attempting a mutation
    #[error("{0}")]
    Authorization(String),

    /// Duplicate resource (e.g. email already registered)
    #[error("{0}")]
    Conflict(String),

    /// Action not permitted from the current lifecycle stage
    #[error("Action {action} is not allowed for {role} when batch is {stage}")]
    IllegalTransition {
        /// Attempted action
        action: BatchAction,
        /// Requesting role
        role: crate::types::Role,
        /// Derived stage the batch was in
        stage: String,
    },

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error (bincode-encoded records)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Serialization error (JSON-encoded records)
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure; logged server-side, generic message to callers
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is a lifecycle violation
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Error::IllegalTransition { .. })
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_illegal_transition_message() {
        let err = Error::IllegalTransition {
            action: BatchAction::InTransit,
            role: Role::Distributor,
            stage: "CREATED".to_string(),
        };
        assert!(err.is_illegal_transition());
        assert!(err.to_string().contains("IN_TRANSIT"));
        assert!(err.to_string().contains("CREATED"));
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound("Batch FARM-2025-0001".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Batch FARM-2025-0001 not found");
    }
}
