//! The transactional map facade
//!
//! Every operation takes the caller's transaction, if any:
//!
//! ```text
//! Some(txn) → participant registered under "TransactionalMap.<cache_id>"
//!             (created and registered on first access) → overlay semantics
//! None      → reads:  shared map
//!             writes: shared map directly, or NoActiveTransaction,
//!                     per NoTransactionPolicy
//! ```
//!
//! [`BoundMap`] resolves the transaction per call from a
//! [`CurrentTransactionProvider`] instead.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use txmap_concurrency::{ConflictResolver, TransactionParticipant};
use txmap_core::{
    CacheEntryFilter, CacheId, CacheKey, CacheValue, CurrentTransactionProvider, Error, Result,
    TransactionHandle,
};
use txmap_storage::{SharedMapBackend, Strategy};

use crate::config::NoTransactionPolicy;
use crate::notification::{InvalidationEvent, InvalidationNotifier};

/// Map whose writes stay private to a transaction until it commits
pub struct TransactionalMap<K, V> {
    cache_id: CacheId,
    member_id: String,
    backend: Arc<dyn SharedMapBackend<K, V>>,
    resolver: Arc<dyn ConflictResolver<K, V>>,
    notifier: Option<Arc<dyn InvalidationNotifier<K, V>>>,
    fast_forward: bool,
    policy: NoTransactionPolicy,
}

impl<K: CacheKey, V: CacheValue> TransactionalMap<K, V> {
    /// Assemble a map from its parts; see `CacheBuilder` for the usual route
    pub fn new(
        cache_id: CacheId,
        backend: Arc<dyn SharedMapBackend<K, V>>,
        resolver: Arc<dyn ConflictResolver<K, V>>,
        notifier: Option<Arc<dyn InvalidationNotifier<K, V>>>,
        fast_forward: bool,
        policy: NoTransactionPolicy,
    ) -> Self {
        Self {
            member_id: cache_id.member_id(),
            cache_id,
            backend,
            resolver,
            notifier,
            fast_forward,
            policy,
        }
    }

    /// Cache id
    pub fn cache_id(&self) -> &CacheId {
        &self.cache_id
    }

    /// Id under which participants register with transactions
    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Shared map strategy
    pub fn strategy(&self) -> Strategy {
        self.backend.strategy()
    }

    /// True if brand-new keys are fast-forwarded
    pub fn fast_forward_enabled(&self) -> bool {
        self.fast_forward
    }

    /// Policy for mutations without a transaction
    pub fn no_transaction_policy(&self) -> NoTransactionPolicy {
        self.policy
    }

    /// The shared map, for inspection
    pub fn shared(&self) -> &Arc<dyn SharedMapBackend<K, V>> {
        &self.backend
    }

    /// Participant for `txn`, created and registered on first access
    ///
    /// # Errors
    ///
    /// Fails if the transaction no longer accepts members, or if another
    /// member type is registered under this map's member id.
    pub fn participant(
        &self,
        txn: &dyn TransactionHandle,
    ) -> Result<Arc<TransactionParticipant<K, V>>> {
        if let Some(member) = txn.member(&self.member_id) {
            return member
                .as_any()
                .downcast::<TransactionParticipant<K, V>>()
                .map_err(|_| Error::MemberTypeMismatch {
                    member_id: self.member_id.clone(),
                });
        }

        let participant = Arc::new(TransactionParticipant::new(
            self.member_id.clone(),
            txn.transaction_id(),
            Arc::clone(&self.backend),
            Arc::clone(&self.resolver),
            self.fast_forward,
        ));
        txn.register_member(participant.clone())?;
        debug!(txn = %txn.transaction_id(), cache = %self.cache_id, "Registered participant");
        Ok(participant)
    }

    /// Gate for mutations without a transaction
    fn direct_write(&self) -> Result<&dyn SharedMapBackend<K, V>> {
        match self.policy {
            NoTransactionPolicy::SharedDirect => Ok(self.backend.as_ref()),
            NoTransactionPolicy::Reject => Err(Error::NoActiveTransaction {
                cache_id: self.cache_id.clone(),
            }),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Visible value for `key`
    pub fn get(&self, txn: Option<&dyn TransactionHandle>, key: &K) -> Result<Option<V>> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.get(key)),
            None => Ok(self.backend.get(key)),
        }
    }

    /// True if `key` is visible
    pub fn contains_key(&self, txn: Option<&dyn TransactionHandle>, key: &K) -> Result<bool> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.contains_key(key)),
            None => Ok(self.backend.contains_key(key)),
        }
    }

    /// True if some visible entry holds `value`
    pub fn contains_value(&self, txn: Option<&dyn TransactionHandle>, value: &V) -> Result<bool> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.contains_value(value)),
            None => Ok(self.backend.view().contains_value(value)),
        }
    }

    /// Number of visible entries
    pub fn len(&self, txn: Option<&dyn TransactionHandle>) -> Result<usize> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.len()),
            None => Ok(self.backend.len()),
        }
    }

    /// True if no entry is visible
    pub fn is_empty(&self, txn: Option<&dyn TransactionHandle>) -> Result<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Visible entries
    pub fn entries(&self, txn: Option<&dyn TransactionHandle>) -> Result<Vec<(K, V)>> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.entries().collect()),
            None => Ok(self.backend.view().entries()),
        }
    }

    /// Visible keys
    pub fn keys(&self, txn: Option<&dyn TransactionHandle>) -> Result<Vec<K>> {
        Ok(self.entries(txn)?.into_iter().map(|(k, _)| k).collect())
    }

    /// Visible values
    pub fn values(&self, txn: Option<&dyn TransactionHandle>) -> Result<Vec<V>> {
        Ok(self.entries(txn)?.into_iter().map(|(_, v)| v).collect())
    }

    /// Owned copy of the visible entries
    pub fn snapshot(&self, txn: Option<&dyn TransactionHandle>) -> Result<HashMap<K, V>> {
        Ok(self.entries(txn)?.into_iter().collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write `value` under `key`, returning the previously visible value
    pub fn put(&self, txn: Option<&dyn TransactionHandle>, key: K, value: V) -> Result<Option<V>> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.put(key, value)),
            None => Ok(self.direct_write()?.put_direct(key, value)),
        }
    }

    /// Write every entry of `entries`
    pub fn put_all(
        &self,
        txn: Option<&dyn TransactionHandle>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()> {
        match txn {
            Some(txn) => self.participant(txn)?.put_all(entries),
            None => {
                let shared = self.direct_write()?;
                for (key, value) in entries {
                    shared.put_direct(key, value);
                }
            }
        }
        Ok(())
    }

    /// Remove `key`, returning the previously visible value
    pub fn remove(&self, txn: Option<&dyn TransactionHandle>, key: &K) -> Result<Option<V>> {
        match txn {
            Some(txn) => Ok(self.participant(txn)?.remove(key)),
            None => Ok(self.direct_write()?.evict(key)),
        }
    }

    /// Remove every visible entry
    pub fn clear(&self, txn: Option<&dyn TransactionHandle>) -> Result<()> {
        match txn {
            Some(txn) => self.participant(txn)?.clear(),
            None => self.direct_write()?.clear(),
        }
        Ok(())
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Remove the entries accepted by `filter`, returning the count
    ///
    /// Inside a transaction the removals go through the overlay and stay
    /// private until commit. Outside one they apply to the shared map
    /// regardless of [`NoTransactionPolicy`]. With `propagate`, the
    /// configured notifier receives an [`InvalidationEvent`].
    pub fn invalidate(
        &self,
        txn: Option<&dyn TransactionHandle>,
        filter: Arc<dyn CacheEntryFilter<K, V>>,
        propagate: bool,
    ) -> Result<usize> {
        let removed = match txn {
            Some(txn) => self.participant(txn)?.remove_matching(filter.as_ref()),
            None => self.backend.remove_matching(filter.as_ref()),
        };
        info!(
            cache = %self.cache_id,
            removed,
            in_transaction = txn.is_some(),
            propagate,
            "Invalidated entries"
        );

        if propagate {
            if let Some(notifier) = &self.notifier {
                notifier.notify(InvalidationEvent {
                    cache_id: self.cache_id.clone(),
                    filter,
                });
            }
        }
        Ok(removed)
    }

    /// Apply an invalidation received from elsewhere to the shared map
    pub fn apply_remote_invalidation(&self, filter: &dyn CacheEntryFilter<K, V>) -> usize {
        let removed = self.backend.remove_matching(filter);
        debug!(cache = %self.cache_id, removed, "Applied remote invalidation");
        removed
    }

    /// View of this map that takes its transaction from `provider`
    pub fn bind<'a>(&'a self, provider: &'a dyn CurrentTransactionProvider) -> BoundMap<'a, K, V> {
        BoundMap {
            map: self,
            provider,
        }
    }
}

/// A [`TransactionalMap`] paired with a source for the current transaction
pub struct BoundMap<'a, K, V> {
    map: &'a TransactionalMap<K, V>,
    provider: &'a dyn CurrentTransactionProvider,
}

impl<K: CacheKey, V: CacheValue> BoundMap<'_, K, V> {
    fn current(&self) -> Option<Arc<dyn TransactionHandle>> {
        self.provider.current()
    }

    /// See [`TransactionalMap::get`]
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.map.get(self.current().as_deref(), key)
    }

    /// See [`TransactionalMap::contains_key`]
    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.map.contains_key(self.current().as_deref(), key)
    }

    /// See [`TransactionalMap::contains_value`]
    pub fn contains_value(&self, value: &V) -> Result<bool> {
        self.map.contains_value(self.current().as_deref(), value)
    }

    /// See [`TransactionalMap::len`]
    pub fn len(&self) -> Result<usize> {
        self.map.len(self.current().as_deref())
    }

    /// See [`TransactionalMap::is_empty`]
    pub fn is_empty(&self) -> Result<bool> {
        self.map.is_empty(self.current().as_deref())
    }

    /// See [`TransactionalMap::entries`]
    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        self.map.entries(self.current().as_deref())
    }

    /// See [`TransactionalMap::keys`]
    pub fn keys(&self) -> Result<Vec<K>> {
        self.map.keys(self.current().as_deref())
    }

    /// See [`TransactionalMap::values`]
    pub fn values(&self) -> Result<Vec<V>> {
        self.map.values(self.current().as_deref())
    }

    /// See [`TransactionalMap::snapshot`]
    pub fn snapshot(&self) -> Result<HashMap<K, V>> {
        self.map.snapshot(self.current().as_deref())
    }

    /// See [`TransactionalMap::put`]
    pub fn put(&self, key: K, value: V) -> Result<Option<V>> {
        self.map.put(self.current().as_deref(), key, value)
    }

    /// See [`TransactionalMap::put_all`]
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        self.map.put_all(self.current().as_deref(), entries)
    }

    /// See [`TransactionalMap::remove`]
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.map.remove(self.current().as_deref(), key)
    }

    /// See [`TransactionalMap::clear`]
    pub fn clear(&self) -> Result<()> {
        self.map.clear(self.current().as_deref())
    }

    /// See [`TransactionalMap::invalidate`]
    pub fn invalidate(
        &self,
        filter: Arc<dyn CacheEntryFilter<K, V>>,
        propagate: bool,
    ) -> Result<usize> {
        self.map.invalidate(self.current().as_deref(), filter, propagate)
    }
}
