//! Outbound invalidation notifications
//!
//! When a cache is invalidated with propagation requested, the map emits an
//! [`InvalidationEvent`] to its notifier. Fanning the event out to other
//! nodes or clients is the notifier's job; receivers apply it with
//! `TransactionalMap::apply_remote_invalidation`.

use std::fmt;
use std::sync::Arc;
use txmap_core::{CacheEntryFilter, CacheId};

/// An invalidation to propagate
pub struct InvalidationEvent<K, V> {
    /// Cache that was invalidated
    pub cache_id: CacheId,
    /// Entries that were invalidated
    pub filter: Arc<dyn CacheEntryFilter<K, V>>,
}

impl<K, V> Clone for InvalidationEvent<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache_id: self.cache_id.clone(),
            filter: Arc::clone(&self.filter),
        }
    }
}

impl<K, V> fmt::Debug for InvalidationEvent<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationEvent")
            .field("cache_id", &self.cache_id)
            .finish_non_exhaustive()
    }
}

/// Receiver of invalidation events
pub trait InvalidationNotifier<K, V>: Send + Sync {
    /// Deliver one event; must not call back into the emitting map
    fn notify(&self, event: InvalidationEvent<K, V>);
}
