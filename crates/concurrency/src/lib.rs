//! Concurrency layer for txmap
//!
//! This crate implements the per-transaction side of the map:
//! - Overlay: private removed/inserted deltas over the shared map
//! - TransactionParticipant: map surface over overlay + shared view, and
//!   the two-phase commit member that merges the overlay on commit
//! - Entries: single-pass merged iterator with write-through `set_value`
//! - ConflictResolver: what happens to keys whose merge failed
//! - Transaction / TransactionManager: a minimal two-phase coordinator
//!
//! Commit conflicts never fail a transaction. They are resolved per key,
//! by default by evicting the key from the shared map.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conflict;
pub mod iter;
pub mod overlay;
pub mod participant;
pub mod transaction;

pub use conflict::{ConflictResolver, EvictOnConflict, RetainOnConflict};
pub use iter::Entries;
pub use overlay::{Lookup, Overlay};
pub use participant::{PendingOperations, TransactionParticipant};
pub use transaction::{Transaction, TransactionManager, TransactionSlot, TransactionStatus};
