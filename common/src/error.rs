//! Error types for mockva operations.

use crate::{AccountId, Money};
use thiserror::Error;

/// Main error type for mockva operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockvaError {
    /// Malformed or out-of-range input. Never touches storage.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Account or its balance row does not exist.
    #[error("Account with ID {0} not found")]
    AccountNotFound(AccountId),

    /// Registration for an ID that is already taken.
    #[error("Account with ID {0} already exist")]
    AccountAlreadyExists(AccountId),

    /// Source balance would go negative and negative balance is disallowed.
    #[error("Insufficient funds in account {account_id}: requested {amount}, balance {balance}")]
    InsufficientFunds {
        account_id: AccountId,
        amount: Money,
        balance: Money,
    },

    /// Lock acquisition, write, or commit failure in the backing store.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Caller cancellation or deadline fired before completion.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl MockvaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        MockvaError::InvalidRequest(message.into())
    }

    pub fn storage(message: impl ToString) -> Self {
        MockvaError::StorageError(message.to_string())
    }

    /// Check if this error is retryable. Only storage failures may be
    /// transient; everything else needs the request or the data to change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MockvaError::StorageError(_))
    }

    /// Business-rule rejections, as opposed to infrastructure failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MockvaError::InvalidRequest(_)
                | MockvaError::AccountNotFound(_)
                | MockvaError::AccountAlreadyExists(_)
                | MockvaError::InsufficientFunds { .. }
        )
    }

    /// Get the client-visible error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            MockvaError::InvalidRequest(_) => "30",
            MockvaError::AccountNotFound(_) => "76",
            MockvaError::AccountAlreadyExists(_) => "68",
            MockvaError::InsufficientFunds { .. } => "51",
            MockvaError::StorageError(_) => "96",
            MockvaError::Cancelled(_) => "91",
            MockvaError::ConfigurationError(_) => "96",
        }
    }
}

/// Result type alias for mockva operations.
pub type Result<T> = std::result::Result<T, MockvaError>;
