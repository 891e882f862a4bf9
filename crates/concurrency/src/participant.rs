//! Transaction participant
//!
//! One participant exists per (map, transaction) pair. It is the map as seen
//! from inside that transaction: reads go through the overlay to the shared
//! view, writes land in the overlay (or, with fast-forward, directly in the
//! shared map). As a [`TransactionMember`] it merges the overlay into the
//! shared map during commit phase 2.
//!
//! # Isolation
//!
//! - Lock-free backends hand out a live view: keys this transaction has not
//!   touched always show the latest committed value.
//! - Copy-on-write backends hand out the snapshot published at first access;
//!   the participant stays pinned to it until it commits or fast-forwards.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};
use txmap_core::{CacheEntryFilter, CacheKey, CacheValue, TransactionId, TransactionMember};
use txmap_storage::{CommitOutcome, SharedMapBackend, SharedView};

use crate::conflict::ConflictResolver;
use crate::iter::Entries;
use crate::overlay::Overlay;

/// Summary of the deltas a participant would commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOperations {
    /// Keys with a recorded removal
    pub removed: usize,
    /// Keys with a pending insertion
    pub inserted: usize,
}

impl PendingOperations {
    /// True if nothing would be committed
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.inserted == 0
    }
}

struct ParticipantState<K, V> {
    overlay: Overlay<K, V>,
    view: SharedView<K, V>,
    last_outcome: Option<CommitOutcome<K>>,
    /// Set by an invalidation that named no keys
    invalidated: bool,
    released: bool,
}

/// Overlay-backed map bound to one transaction
pub struct TransactionParticipant<K, V> {
    member_id: String,
    transaction_id: TransactionId,
    shared: Arc<dyn SharedMapBackend<K, V>>,
    resolver: Arc<dyn ConflictResolver<K, V>>,
    fast_forward: bool,
    state: Mutex<ParticipantState<K, V>>,
}

impl<K: CacheKey, V: CacheValue> TransactionParticipant<K, V> {
    /// Create a participant and take its shared view
    pub fn new(
        member_id: impl Into<String>,
        transaction_id: TransactionId,
        shared: Arc<dyn SharedMapBackend<K, V>>,
        resolver: Arc<dyn ConflictResolver<K, V>>,
        fast_forward: bool,
    ) -> Self {
        let view = shared.view();
        Self {
            member_id: member_id.into(),
            transaction_id,
            shared,
            resolver,
            fast_forward,
            state: Mutex::new(ParticipantState {
                overlay: Overlay::new(),
                view,
                last_outcome: None,
                invalidated: false,
                released: false,
            }),
        }
    }

    /// Transaction this participant belongs to
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// True if writes of new keys go straight to the shared map
    pub fn fast_forward_enabled(&self) -> bool {
        self.fast_forward
    }

    /// Visible value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        state.overlay.get(key, &state.view)
    }

    /// True if `key` is visible
    pub fn contains_key(&self, key: &K) -> bool {
        let state = self.state.lock();
        state.overlay.contains_key(key, &state.view)
    }

    /// True if some visible entry holds `value`
    pub fn contains_value(&self, value: &V) -> bool {
        self.entries().any(|(_, v)| v == *value)
    }

    /// Write `value` under `key`, returning the previously visible value
    ///
    /// A key that is new to both the shared map and this transaction is
    /// fast-forwarded into the shared map when enabled. If another writer
    /// wins that race the write falls back to the overlay. Keys this
    /// transaction removed or invalidated are never fast-forwarded.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let mut state = self.state.lock();
        let mut shared_value = state.view.get(&key);

        if self.fast_forward
            && !state.invalidated
            && shared_value.is_none()
            && !state.overlay.is_removed(&key)
            && !state.overlay.is_inserted(&key)
        {
            if self.shared.fast_forward(key.clone(), value.clone()) {
                trace!(txn = %self.transaction_id, key = ?key, "Fast-forwarded new key");
                state.view.absorb(key, value);
                return None;
            }
            debug!(txn = %self.transaction_id, key = ?key, "Fast-forward lost race, using overlay");
            shared_value = self.shared.get(&key);
        }

        state.overlay.record_put(key, value, shared_value)
    }

    /// Write every entry of `entries`
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in entries {
            self.put(key, value);
        }
    }

    /// Remove `key`, returning the previously visible value
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        let ParticipantState { overlay, view, .. } = &mut *state;
        overlay.record_remove(key, view)
    }

    /// Number of visible entries
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.overlay.len(&state.view)
    }

    /// True if no entry is visible
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hide every visible entry
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let ParticipantState { overlay, view, .. } = &mut *state;
        overlay.clear_visible(view);
    }

    /// Remove every visible entry accepted by `filter`, returning the count
    ///
    /// Keys named by the filter are marked removed even when nothing is
    /// visible under them. A filter that names no keys disables
    /// fast-forward for the rest of the transaction.
    pub fn remove_matching(&self, filter: &dyn CacheEntryFilter<K, V>) -> usize {
        if let Some(keys) = filter.keys() {
            let mut removed = 0;
            for key in keys {
                match self.get(&key) {
                    Some(value) if !filter.accept(&key, &value) => continue,
                    Some(_) => removed += 1,
                    None => {}
                }
                self.remove(&key);
            }
            return removed;
        }

        self.state.lock().invalidated = true;
        let matching: Vec<K> = self
            .entries()
            .filter(|(k, v)| filter.accept(k, v))
            .map(|(k, _)| k)
            .collect();
        for key in &matching {
            self.remove(key);
        }
        matching.len()
    }

    /// Single-pass iterator over the visible entries
    pub fn entries(&self) -> Entries<'_, K, V> {
        let state = self.state.lock();
        let (removed, inserted) = state.overlay.shadow();
        Entries::new(self, state.view.entries(), removed, inserted)
    }

    /// Visible keys
    pub fn keys(&self) -> Vec<K> {
        self.entries().map(|(k, _)| k).collect()
    }

    /// Visible values
    pub fn values(&self) -> Vec<V> {
        self.entries().map(|(_, v)| v).collect()
    }

    /// Owned copy of the visible entries
    pub fn snapshot(&self) -> HashMap<K, V> {
        self.entries().collect()
    }

    /// Deltas that the next commit would merge
    pub fn pending(&self) -> PendingOperations {
        let state = self.state.lock();
        PendingOperations {
            removed: state.overlay.removed_len(),
            inserted: state.overlay.inserted_len(),
        }
    }

    /// Per-key results of the last commit phase 2, if one ran
    pub fn last_outcome(&self) -> Option<CommitOutcome<K>> {
        self.state.lock().last_outcome.clone()
    }

    /// True once the transaction released this participant
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

impl<K: CacheKey, V: CacheValue> TransactionMember for TransactionParticipant<K, V> {
    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn needs_commit(&self) -> bool {
        self.state.lock().overlay.is_dirty()
    }

    fn commit_phase1(&self) -> bool {
        true
    }

    fn commit_phase2(&self) {
        let mut state = self.state.lock();
        let changes = state.overlay.take_changes();
        if changes.is_empty() {
            return;
        }

        let outcome = self.shared.apply(changes);
        self.resolver.resolve(self.shared.as_ref(), &outcome);
        debug!(
            txn = %self.transaction_id,
            member = %self.member_id,
            committed = outcome.success_count(),
            conflicts = outcome.conflict_count(),
            "Merged overlay into shared map"
        );

        state.view = self.shared.view();
        state.last_outcome = Some(outcome);
    }

    fn rollback(&self) {
        let mut state = self.state.lock();
        if state.overlay.is_dirty() {
            debug!(txn = %self.transaction_id, member = %self.member_id, "Discarding overlay");
        }
        state.overlay.discard();
        state.invalidated = false;
    }

    fn cancel(&self) {
        trace!(txn = %self.transaction_id, member = %self.member_id, "Cancel requested");
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.overlay.discard();
        state.released = true;
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
