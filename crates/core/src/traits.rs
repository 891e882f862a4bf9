//! Contracts between the transactional map and the external transaction manager
//!
//! The map never drives a transaction itself. It registers one
//! [`TransactionMember`] per transaction through a [`TransactionHandle`] and
//! is then called back by the manager during the two-phase commit.

use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::types::TransactionId;

/// Participant in an externally driven two-phase commit
///
/// All callbacks take `&self`: members are shared between the transaction
/// and the component that created them, and keep their mutable state behind
/// their own lock.
///
/// # Lifecycle
///
/// ```text
/// register → [commit_phase1 → commit_phase2 | rollback | cancel] → release
/// ```
pub trait TransactionMember: Send + Sync + 'static {
    /// Stable id; the transaction holds at most one member per id
    fn member_id(&self) -> &str;

    /// True if the member has pending changes
    fn needs_commit(&self) -> bool;

    /// Prepare phase. Returning `false` vetoes the whole transaction.
    fn commit_phase1(&self) -> bool;

    /// Apply pending changes. Must not fail the transaction.
    fn commit_phase2(&self);

    /// Discard pending changes. Idempotent.
    fn rollback(&self);

    /// Abort any in-flight work of this member
    fn cancel(&self);

    /// Last callback of the lifecycle; the member is dropped by the transaction afterwards
    fn release(&self);

    /// Upcast used to recover the concrete member type after a lookup by id
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// The active transaction as seen by one call
///
/// Passed explicitly into every map operation instead of being looked up in
/// ambient thread-local state.
pub trait TransactionHandle: Send + Sync {
    /// Identifier of this transaction
    fn transaction_id(&self) -> TransactionId;

    /// Member registered under `member_id`, if any
    fn member(&self, member_id: &str) -> Option<Arc<dyn TransactionMember>>;

    /// Register a new member
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer accepting work, or if a member
    /// with the same id is already registered. The existing member is kept.
    fn register_member(&self, member: Arc<dyn TransactionMember>) -> Result<()>;
}

/// Source of "the active transaction for this call"
///
/// Injected into callers that cannot thread a handle through every call.
pub trait CurrentTransactionProvider: Send + Sync {
    /// The active transaction, or `None` outside of any transaction
    fn current(&self) -> Option<Arc<dyn TransactionHandle>>;
}
