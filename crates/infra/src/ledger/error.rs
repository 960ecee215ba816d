use thiserror::Error;

use stockroom_core::DomainError;

use crate::repository::RepositoryError;

/// Failure surfaced by the ledger services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Product/store id or SKU does not resolve to an active record.
    #[error("not found: {0}")]
    NotFound(String),

    /// Negative or otherwise malformed quantity/threshold. Rejected before any mutation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A decrease would drive stock below zero.
    #[error("insufficient stock (available: {available}, requested: {requested})")]
    InsufficientStock { available: i64, requested: i64 },

    /// The compare-and-swap retry budget ran out under contention.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// An aggregate does not fit the numeric range of the report.
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// Storage failure, propagated as-is.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::InvalidArgument(msg),
            DomainError::InvariantViolation(msg) => LedgerError::InvalidArgument(msg),
            DomainError::InvalidId(msg) => LedgerError::InvalidArgument(msg),
            DomainError::NotFound(what) => LedgerError::NotFound(what),
            DomainError::InsufficientStock {
                available,
                requested,
            } => LedgerError::InsufficientStock {
                available,
                requested,
            },
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
            DomainError::Overflow(msg) => LedgerError::Overflow(msg),
        }
    }
}

impl From<RepositoryError> for LedgerError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(what) => LedgerError::NotFound(what),
            RepositoryError::Conflict(msg) => LedgerError::Conflict(msg),
            other => LedgerError::Repository(other),
        }
    }
}
