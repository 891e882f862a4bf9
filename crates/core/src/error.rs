//! Error types for txmap
//!
//! All fallible operations return [`Result`]. Commit-time key conflicts are
//! not errors: they are reported as values and resolved by eviction.

use thiserror::Error;

use crate::types::CacheId;

/// Result type alias for txmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the transactional map
#[derive(Debug, Error)]
pub enum Error {
    /// A mutating call arrived without a transaction and the cache rejects those
    #[error("No active transaction for mutation of cache '{cache_id}'")]
    NoActiveTransaction {
        /// Cache that refused the call
        cache_id: CacheId,
    },

    /// An entry iterator was advanced past its last element
    #[error("Iterator exhausted")]
    IteratorExhausted,

    /// `set_value` was called on an entry iterator before the first element
    #[error("No current entry to update")]
    NoCurrentEntry,

    /// A member registered under this id has an unexpected concrete type
    #[error("Transaction member '{member_id}' has an unexpected type")]
    MemberTypeMismatch {
        /// Member id that was looked up
        member_id: String,
    },

    /// A member with this id is already registered with the transaction
    #[error("Transaction member '{member_id}' is already registered")]
    DuplicateMember {
        /// Id of the rejected registration
        member_id: String,
    },

    /// The transaction is no longer accepting work
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// Human-readable state of the transaction
        state: String,
    },

    /// Configuration could not be parsed or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// True for errors caused by misuse of the transaction lifecycle
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(
            self,
            Error::NoActiveTransaction { .. } | Error::TransactionNotActive { .. }
        )
    }
}
