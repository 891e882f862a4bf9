//! Core types and traits for txmap
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: crate-wide error enum and `Result` alias
//! - CacheId, TransactionId: identifiers
//! - CacheKey, CacheValue: key and value bounds
//! - TransactionMember: two-phase commit participant contract
//! - TransactionHandle, CurrentTransactionProvider: access to the active transaction
//! - CacheEntryFilter: predicates used for invalidation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::{AllEntriesFilter, CacheEntryFilter, KeyFilter, PredicateFilter};
pub use traits::{CurrentTransactionProvider, TransactionHandle, TransactionMember};
pub use types::{CacheId, CacheKey, CacheValue, TransactionId};
