//! Two-phase transaction coordinator
//!
//! The map only participates in transactions; it never begins or ends them.
//! This module provides the coordinator side of the contract so the map can
//! be driven end to end:
//!
//! ```text
//! begin() → register members → commit()
//!                                 ├─ Committing: registration closed
//!                                 ├─ phase 1 on every member that needs commit
//!                                 ├─ all agreed?  phase 2 on those members → Committed
//!                                 └─ any veto?    rollback on every member → RolledBack
//!                              → release every member
//! ```

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use txmap_core::{
    CurrentTransactionProvider, Error, Result, TransactionHandle, TransactionId, TransactionMember,
};

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Committing` → `Committed` (every member agreed in phase 1)
/// - `Active` → `Committing` → `RolledBack` (phase 1 veto)
/// - `Active` → `RolledBack` (explicit rollback)
/// - `Active` → `Cancelled` (explicit cancel)
///
/// Only `Active` accepts work. `Committing` lasts for the duration of
/// [`Transaction::commit`]; every other state is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting work
    Active,
    /// Phase 1 in progress
    Committing,
    /// Committed
    Committed,
    /// Rolled back
    RolledBack {
        /// Human-readable reason
        reason: String,
    },
    /// Cancelled, then rolled back
    Cancelled,
}

impl TransactionStatus {
    fn describe(&self) -> String {
        match self {
            TransactionStatus::Active => "active".to_string(),
            TransactionStatus::Committing => "committing".to_string(),
            TransactionStatus::Committed => "committed".to_string(),
            TransactionStatus::RolledBack { reason } => format!("rolled back: {}", reason),
            TransactionStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

/// A transaction and its registered members
pub struct Transaction {
    id: TransactionId,
    members: Mutex<Vec<Arc<dyn TransactionMember>>>,
    status: Mutex<TransactionStatus>,
}

impl Transaction {
    /// Create an active transaction
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            members: Mutex::new(Vec::new()),
            status: Mutex::new(TransactionStatus::Active),
        }
    }

    /// Current status
    pub fn status(&self) -> TransactionStatus {
        self.status.lock().clone()
    }

    /// True while the transaction accepts work
    pub fn is_active(&self) -> bool {
        *self.status.lock() == TransactionStatus::Active
    }

    /// Number of registered members
    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    fn ensure_active(&self) -> Result<()> {
        let status = self.status.lock();
        if *status == TransactionStatus::Active {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: status.describe(),
            })
        }
    }

    /// Leave `Active`, returning the members to finish
    fn finish(&self, next: TransactionStatus) -> Result<Vec<Arc<dyn TransactionMember>>> {
        let mut status = self.status.lock();
        if *status != TransactionStatus::Active {
            return Err(Error::TransactionNotActive {
                state: status.describe(),
            });
        }
        *status = next;
        Ok(std::mem::take(&mut *self.members.lock()))
    }

    /// Commit all members
    ///
    /// Returns `Ok(true)` if the transaction committed and `Ok(false)` if a
    /// member vetoed in phase 1 and the transaction was rolled back instead.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active.
    pub fn commit(&self) -> Result<bool> {
        let members = self.finish(TransactionStatus::Committing)?;
        let dirty: Vec<_> = members.iter().filter(|m| m.needs_commit()).collect();

        if let Some(veto) = dirty.iter().find(|m| !m.commit_phase1()) {
            let reason = format!("member '{}' vetoed phase 1", veto.member_id());
            warn!(txn = %self.id, reason = %reason, "Rolling back");
            *self.status.lock() = TransactionStatus::RolledBack { reason };
            for member in &members {
                member.rollback();
            }
            release_all(&members);
            return Ok(false);
        }

        *self.status.lock() = TransactionStatus::Committed;
        for member in &dirty {
            member.commit_phase2();
        }
        debug!(txn = %self.id, members = members.len(), committed = dirty.len(), "Transaction committed");
        release_all(&members);
        Ok(true)
    }

    /// Roll back all members
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active.
    pub fn rollback(&self) -> Result<()> {
        let members = self.finish(TransactionStatus::RolledBack {
            reason: "explicit rollback".to_string(),
        })?;
        for member in &members {
            member.rollback();
        }
        debug!(txn = %self.id, members = members.len(), "Transaction rolled back");
        release_all(&members);
        Ok(())
    }

    /// Cancel all members, then roll them back
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active.
    pub fn cancel(&self) -> Result<()> {
        let members = self.finish(TransactionStatus::Cancelled)?;
        for member in &members {
            member.cancel();
            member.rollback();
        }
        debug!(txn = %self.id, members = members.len(), "Transaction cancelled");
        release_all(&members);
        Ok(())
    }
}

fn release_all(members: &[Arc<dyn TransactionMember>]) {
    for member in members {
        member.release();
    }
}

impl TransactionHandle for Transaction {
    fn transaction_id(&self) -> TransactionId {
        self.id
    }

    fn member(&self, member_id: &str) -> Option<Arc<dyn TransactionMember>> {
        self.members
            .lock()
            .iter()
            .find(|m| m.member_id() == member_id)
            .cloned()
    }

    fn register_member(&self, member: Arc<dyn TransactionMember>) -> Result<()> {
        self.ensure_active()?;
        let mut members = self.members.lock();
        if members.iter().any(|m| m.member_id() == member.member_id()) {
            return Err(Error::DuplicateMember {
                member_id: member.member_id().to_string(),
            });
        }
        members.push(member);
        Ok(())
    }
}

/// Hands out transactions with increasing ids
pub struct TransactionManager {
    next_txn_id: AtomicU64,
}

impl TransactionManager {
    /// Create a manager whose first transaction gets id 1
    pub fn new() -> Self {
        Self::with_start_id(1)
    }

    /// Create a manager whose first transaction gets `first_id`
    pub fn with_start_id(first_id: u64) -> Self {
        Self {
            next_txn_id: AtomicU64::new(first_id),
        }
    }

    /// Allocate the next transaction id
    pub fn next_txn_id(&self) -> TransactionId {
        TransactionId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Arc<Transaction> {
        let txn = Arc::new(Transaction::new(self.next_txn_id()));
        debug!(txn = %txn.id, "Transaction started");
        txn
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Settable "current transaction" for callers that cannot pass a handle
#[derive(Default)]
pub struct TransactionSlot {
    current: RwLock<Option<Arc<dyn TransactionHandle>>>,
}

impl TransactionSlot {
    /// Empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `txn` the current transaction
    pub fn set(&self, txn: Arc<dyn TransactionHandle>) {
        *self.current.write() = Some(txn);
    }

    /// Clear the current transaction, returning it
    pub fn clear(&self) -> Option<Arc<dyn TransactionHandle>> {
        self.current.write().take()
    }
}

impl CurrentTransactionProvider for TransactionSlot {
    fn current(&self) -> Option<Arc<dyn TransactionHandle>> {
        self.current.read().clone()
    }
}
