//! Merged entry iterator
//!
//! Yields the entries visible to one transaction in two passes:
//! 1. shared entries not hidden by a removal, with a pending insertion
//!    substituted for the shared value where one exists
//! 2. pending insertions whose key was not yielded in pass 1
//!
//! The iterator works on a copy of the overlay taken when it was created and
//! is single-pass. Entries are plain values; [`Entries::set_value`] writes
//! through to the participant for the entry last yielded.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::hash_map;
use std::iter::FusedIterator;
use std::vec;
use txmap_core::{CacheKey, CacheValue, Error, Result};

use crate::participant::TransactionParticipant;

/// Iterator over the visible entries of a participant
pub struct Entries<'a, K, V> {
    participant: &'a TransactionParticipant<K, V>,
    shared: vec::IntoIter<(K, V)>,
    removed: FxHashSet<K>,
    inserted: FxHashMap<K, V>,
    rest: Option<hash_map::IntoIter<K, V>>,
    current: Option<K>,
}

impl<'a, K: CacheKey, V: CacheValue> Entries<'a, K, V> {
    pub(crate) fn new(
        participant: &'a TransactionParticipant<K, V>,
        shared: Vec<(K, V)>,
        removed: FxHashSet<K>,
        inserted: FxHashMap<K, V>,
    ) -> Self {
        Self {
            participant,
            shared: shared.into_iter(),
            removed,
            inserted,
            rest: None,
            current: None,
        }
    }

    /// Next entry, or `IteratorExhausted` past the end
    pub fn next_entry(&mut self) -> Result<(K, V)> {
        self.next().ok_or(Error::IteratorExhausted)
    }

    /// Write `value` for the entry last yielded
    ///
    /// Goes through [`TransactionParticipant::put`], so the write follows the
    /// same overlay rules as any other write. The iteration itself is not
    /// affected. Returns the previously visible value.
    pub fn set_value(&mut self, value: V) -> Result<Option<V>> {
        let key = self.current.clone().ok_or(Error::NoCurrentEntry)?;
        Ok(self.participant.put(key, value))
    }

    fn next_shared(&mut self) -> Option<(K, V)> {
        for (key, value) in self.shared.by_ref() {
            if let Some(pending) = self.inserted.remove(&key) {
                return Some((key, pending));
            }
            if !self.removed.contains(&key) {
                return Some((key, value));
            }
        }
        None
    }
}

impl<K: CacheKey, V: CacheValue> Iterator for Entries<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.rest {
            None => match self.next_shared() {
                Some(entry) => Some(entry),
                None => {
                    let rest = self.rest.insert(std::mem::take(&mut self.inserted).into_iter());
                    rest.next()
                }
            },
            Some(ref mut rest) => rest.next(),
        };
        if let Some((key, _)) = &entry {
            self.current = Some(key.clone());
        }
        entry
    }
}

impl<K: CacheKey, V: CacheValue> FusedIterator for Entries<'_, K, V> {}
