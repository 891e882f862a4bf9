//! Shared map storage for txmap
//!
//! This crate holds the cross-transaction state of a transactional map:
//! - SharedMapBackend: strategy interface used by participants and the facade
//! - LockFreeBackend: DashMap, commit applies per-key compare-and-swap
//! - CopyOnWriteBackend: immutable snapshot swapped under a single mutex
//! - SharedView: what a transaction reads through
//! - Write-set types: pending changes in, per-key commit results out
//!
//! The shared map is only mutated through `apply` (commit phase 2),
//! `fast_forward`, and the explicit direct operations used outside of
//! transactions and for eviction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod copy_on_write;
pub mod lock_free;
pub mod view;
pub mod writeset;

pub use backend::{SharedMapBackend, Strategy};
pub use copy_on_write::CopyOnWriteBackend;
pub use lock_free::LockFreeBackend;
pub use view::SharedView;
pub use writeset::{CommitOutcome, KeyCommit, PendingChange};
