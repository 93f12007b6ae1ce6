//! Error types for ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::model::UserId;
use crate::store::StoreError;

/// Top-level error returned by the [`Engine`](super::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient balance: user {user} has {available}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        available: Amount,
        requested: Amount,
    },

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Conflict { entity, id } => {
                EngineError::Validation(ValidationError::Duplicate { entity, id })
            }
            other => EngineError::Storage(other),
        }
    }
}

/// Request rejected before any store call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("missing {0}")]
    MissingId(&'static str),

    #[error("missing user name")]
    MissingName,

    #[error("source and destination are both {0}")]
    SameAccount(UserId),

    #[error("user {0} must open with a zero balance")]
    OpeningBalance(UserId),

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: String },
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientFunds,
    Storage,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether the caller is at fault (4xx) rather than the ledger (5xx).
    pub fn is_client_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage)
    }
}
