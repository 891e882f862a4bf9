//! Integration tests for the transactional map
//!
//! Each behavior is checked against both shared map strategies:
//!
//! 1. **Read-your-writes** - A transaction sees its own pending writes
//! 2. **Commit visibility** - Later transactions see committed writes
//! 3. **Isolation** - Pending writes are private
//! 4. **Conflict eviction** - The losing commit evicts the key
//! 5. **Idempotent removal** - Removing twice changes nothing
//! 6. **Size** - `len` always matches the visible entries
//! 7. **Fast-forward** - New keys are shared before commit
//! 8. **Invalidation** - Filters remove entries locally and propagate

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

use txmap_concurrency::{RetainOnConflict, Transaction, TransactionManager};
use txmap_core::{
    AllEntriesFilter, CacheEntryFilter, Error, KeyFilter, PredicateFilter, TransactionHandle,
};
use txmap_engine::{
    CacheBuilder, CacheConfig, InvalidationEvent, InvalidationNotifier, TransactionalMap,
};
use txmap_storage::Strategy;

// ============================================================================
// Test Helpers
// ============================================================================

const STRATEGIES: [Strategy; 2] = [Strategy::LockFree, Strategy::CopyOnWrite];

fn cache(strategy: Strategy, fast_forward: bool) -> TransactionalMap<String, String> {
    CacheBuilder::new("test")
        .strategy(strategy)
        .fast_forward(fast_forward)
        .build()
        .unwrap()
}

fn key(s: &str) -> String {
    s.to_string()
}

fn val(s: &str) -> String {
    s.to_string()
}

fn tx(txn: &Arc<Transaction>) -> Option<&dyn TransactionHandle> {
    Some(txn.as_ref())
}

/// Notifier that keeps every event it receives
#[derive(Default)]
struct CollectingNotifier {
    events: Mutex<Vec<InvalidationEvent<String, String>>>,
}

impl InvalidationNotifier<String, String> for CollectingNotifier {
    fn notify(&self, event: InvalidationEvent<String, String>) {
        self.events.lock().push(event);
    }
}

// ============================================================================
// Core Properties
// ============================================================================

#[test]
fn test_read_your_writes() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let txn = TransactionManager::new().begin();

        map.put(tx(&txn), key("k"), val("v")).unwrap();
        assert_eq!(map.get(tx(&txn), &key("k")).unwrap(), Some(val("v")), "{}", strategy);
        assert!(map.contains_key(tx(&txn), &key("k")).unwrap());
        assert!(map.contains_value(tx(&txn), &val("v")).unwrap());
    }
}

#[test]
fn test_commit_visibility() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let manager = TransactionManager::new();

        let t1 = manager.begin();
        map.put(tx(&t1), key("k"), val("v")).unwrap();
        assert!(t1.commit().unwrap());

        let t2 = manager.begin();
        assert_eq!(map.get(tx(&t2), &key("k")).unwrap(), Some(val("v")), "{}", strategy);
    }
}

#[test]
fn test_isolation_before_commit() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let manager = TransactionManager::new();
        let t1 = manager.begin();
        let t2 = manager.begin();

        map.put(tx(&t1), key("k"), val("a")).unwrap();
        assert_eq!(map.get(tx(&t2), &key("k")).unwrap(), None, "{}", strategy);
        assert_eq!(map.get(None, &key("k")).unwrap(), None);

        t1.rollback().unwrap();
        assert_eq!(map.get(None, &key("k")).unwrap(), None);
    }
}

#[test]
fn test_lock_free_sees_live_updates_copy_on_write_is_pinned() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let manager = TransactionManager::new();

        let reader = manager.begin();
        assert_eq!(map.get(tx(&reader), &key("k")).unwrap(), None);

        let writer = manager.begin();
        map.put(tx(&writer), key("k"), val("v")).unwrap();
        writer.commit().unwrap();

        let seen = map.get(tx(&reader), &key("k")).unwrap();
        match strategy {
            Strategy::LockFree => assert_eq!(seen, Some(val("v"))),
            Strategy::CopyOnWrite => assert_eq!(seen, None),
        }
    }
}

#[test]
fn test_conflicting_commits_evict_key() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let manager = TransactionManager::new();
        let t1 = manager.begin();
        let t2 = manager.begin();

        assert_eq!(map.get(tx(&t1), &key("k")).unwrap(), None);
        assert_eq!(map.get(tx(&t2), &key("k")).unwrap(), None);
        map.put(tx(&t1), key("k"), val("a")).unwrap();
        map.put(tx(&t2), key("k"), val("b")).unwrap();

        let p1 = map.participant(t1.as_ref()).unwrap();
        let p2 = map.participant(t2.as_ref()).unwrap();
        assert!(t1.commit().unwrap());
        assert!(t2.commit().unwrap());

        assert_eq!(p1.last_outcome().unwrap().conflict_count(), 0);
        assert_eq!(p2.last_outcome().unwrap().conflict_count(), 1);
        assert!(!map.shared().contains_key(&key("k")), "{}: loser must evict", strategy);
    }
}

#[test]
fn test_retain_on_conflict_keeps_winner() {
    let map: TransactionalMap<String, String> = CacheBuilder::new("retain")
        .build_with(Arc::new(RetainOnConflict), None)
        .unwrap();
    let manager = TransactionManager::new();
    let t1 = manager.begin();
    let t2 = manager.begin();

    map.put(tx(&t1), key("k"), val("a")).unwrap();
    map.put(tx(&t2), key("k"), val("b")).unwrap();
    t1.commit().unwrap();
    t2.commit().unwrap();

    assert_eq!(map.get(None, &key("k")).unwrap(), Some(val("a")));
}

#[test]
fn test_remove_twice_is_idempotent() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        map.put(None, key("k"), val("v")).unwrap();
        let txn = TransactionManager::new().begin();

        assert_eq!(map.remove(tx(&txn), &key("k")).unwrap(), Some(val("v")));
        let pending = map.participant(txn.as_ref()).unwrap().pending();
        assert_eq!(map.remove(tx(&txn), &key("k")).unwrap(), None);
        assert_eq!(map.participant(txn.as_ref()).unwrap().pending(), pending);
        assert_eq!(map.len(tx(&txn)).unwrap(), 0);

        // The shared map is untouched until commit
        assert_eq!(map.get(None, &key("k")).unwrap(), Some(val("v")));
        txn.commit().unwrap();
        assert_eq!(map.get(None, &key("k")).unwrap(), None, "{}", strategy);
    }
}

#[test]
fn test_size_matches_entries_for_random_sequences() {
    for strategy in STRATEGIES {
        for seed in 0..5u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let map = cache(strategy, seed % 2 == 0);
            let manager = TransactionManager::new();
            let mut txn = manager.begin();

            for step in 0..60 {
                let k = key(&format!("k{}", rng.gen_range(0..10)));
                match rng.gen_range(0..10) {
                    0..=4 => {
                        map.put(tx(&txn), k, format!("v{}", step)).unwrap();
                    }
                    5..=7 => {
                        map.remove(tx(&txn), &k).unwrap();
                    }
                    8 => {
                        txn.commit().unwrap();
                        txn = manager.begin();
                    }
                    _ => {
                        // Another transaction commits underneath this one
                        let other = manager.begin();
                        map.put(tx(&other), k, format!("other{}", step)).unwrap();
                        other.commit().unwrap();
                    }
                }
                assert_eq!(
                    map.len(tx(&txn)).unwrap(),
                    map.entries(tx(&txn)).unwrap().len(),
                    "{} seed {} step {}",
                    strategy,
                    seed,
                    step
                );
            }
            txn.commit().unwrap();
            assert_eq!(map.len(None).unwrap(), map.entries(None).unwrap().len());
        }
    }
}

#[test]
fn test_fast_forward_visible_without_commit() {
    for strategy in STRATEGIES {
        let map = cache(strategy, true);
        let manager = TransactionManager::new();
        let t1 = manager.begin();

        assert_eq!(map.put(tx(&t1), key("new"), val("v")).unwrap(), None);
        assert!(map.participant(t1.as_ref()).unwrap().pending().is_empty());
        assert_eq!(map.get(tx(&t1), &key("new")).unwrap(), Some(val("v")));

        let t2 = manager.begin();
        assert_eq!(map.get(tx(&t2), &key("new")).unwrap(), Some(val("v")), "{}", strategy);
        assert_eq!(map.get(None, &key("new")).unwrap(), Some(val("v")));

        // Fast-forwarded writes are not undone by rollback
        t1.rollback().unwrap();
        assert_eq!(map.get(None, &key("new")).unwrap(), Some(val("v")));
    }
}

#[test]
fn test_fast_forward_skips_removed_and_existing_keys() {
    for strategy in STRATEGIES {
        let map = cache(strategy, true);
        map.put(None, key("old"), val("1")).unwrap();
        let txn = TransactionManager::new().begin();

        // Existing key goes through the overlay
        assert_eq!(map.put(tx(&txn), key("old"), val("2")).unwrap(), Some(val("1")));
        assert_eq!(map.get(None, &key("old")).unwrap(), Some(val("1")));

        // Removed-then-reinserted new key is never fast-forwarded
        assert_eq!(map.remove(tx(&txn), &key("gone")).unwrap(), None);
        assert_eq!(map.put(tx(&txn), key("gone"), val("3")).unwrap(), None);
        assert_eq!(map.get(None, &key("gone")).unwrap(), None, "{}", strategy);

        txn.commit().unwrap();
        assert_eq!(map.get(None, &key("old")).unwrap(), Some(val("2")));
        assert_eq!(map.get(None, &key("gone")).unwrap(), Some(val("3")));
    }
}

#[test]
fn test_fast_forward_does_not_move_copy_on_write_snapshot() {
    let map = cache(Strategy::CopyOnWrite, true);
    let manager = TransactionManager::new();
    let t1 = manager.begin();
    assert_eq!(map.get(tx(&t1), &key("other")).unwrap(), None);

    let t2 = manager.begin();
    map.put(tx(&t2), key("other"), val("99")).unwrap();
    assert!(t2.commit().unwrap());

    assert_eq!(map.put(tx(&t1), key("mine"), val("1")).unwrap(), None);
    assert_eq!(map.get(None, &key("mine")).unwrap(), Some(val("1")));

    assert_eq!(map.get(tx(&t1), &key("mine")).unwrap(), Some(val("1")));
    assert_eq!(map.get(tx(&t1), &key("other")).unwrap(), None);
    assert_eq!(map.len(tx(&t1)).unwrap(), 1);
    assert_eq!(map.keys(tx(&t1)).unwrap(), vec![key("mine")]);
}

#[test]
fn test_end_to_end_scenario() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        let manager = TransactionManager::new();

        let t1 = manager.begin();
        map.put(tx(&t1), key("x"), val("1")).unwrap();
        t1.commit().unwrap();

        let t2 = manager.begin();
        assert_eq!(map.get(tx(&t2), &key("x")).unwrap(), Some(val("1")));
        assert_eq!(map.len(tx(&t2)).unwrap(), 1);
        map.remove(tx(&t2), &key("x")).unwrap();
        t2.commit().unwrap();

        let t3 = manager.begin();
        assert_eq!(map.get(tx(&t3), &key("x")).unwrap(), None, "{}", strategy);
        assert_eq!(map.len(tx(&t3)).unwrap(), 0);
        assert!(map.is_empty(tx(&t3)).unwrap());
    }
}

// ============================================================================
// Map Surface
// ============================================================================

#[test]
fn test_views_merge_overlay_and_shared() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        map.put_all(None, vec![(key("a"), val("1")), (key("b"), val("2"))])
            .unwrap();
        let txn = TransactionManager::new().begin();

        map.put(tx(&txn), key("b"), val("20")).unwrap();
        map.put(tx(&txn), key("c"), val("3")).unwrap();
        map.remove(tx(&txn), &key("a")).unwrap();

        let expected: HashMap<String, String> =
            [(key("b"), val("20")), (key("c"), val("3"))].into_iter().collect();
        assert_eq!(map.snapshot(tx(&txn)).unwrap(), expected);

        let mut keys = map.keys(tx(&txn)).unwrap();
        keys.sort();
        assert_eq!(keys, vec![key("b"), key("c")]);
        let mut values = map.values(tx(&txn)).unwrap();
        values.sort();
        assert_eq!(values, vec![val("20"), val("3")]);
        assert!(!map.contains_value(tx(&txn), &val("1")).unwrap());
    }
}

#[test]
fn test_clear_in_transaction() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        map.put_all(None, vec![(key("a"), val("1")), (key("b"), val("2"))])
            .unwrap();
        let txn = TransactionManager::new().begin();
        map.put(tx(&txn), key("c"), val("3")).unwrap();

        map.clear(tx(&txn)).unwrap();
        assert!(map.is_empty(tx(&txn)).unwrap());
        assert_eq!(map.len(None).unwrap(), 2);

        txn.commit().unwrap();
        assert!(map.is_empty(None).unwrap(), "{}", strategy);
    }
}

#[test]
fn test_entry_set_value_writes_through() {
    for strategy in STRATEGIES {
        let map = cache(strategy, false);
        map.put_all(None, vec![(key("a"), val("1")), (key("b"), val("2"))])
            .unwrap();
        let txn = TransactionManager::new().begin();
        let participant = map.participant(txn.as_ref()).unwrap();

        let mut entries = participant.entries();
        while let Ok((k, v)) = entries.next_entry() {
            entries.set_value(format!("{}{}", k, v)).unwrap();
        }
        assert!(matches!(entries.next_entry(), Err(Error::IteratorExhausted)));
        drop(entries);

        txn.commit().unwrap();
        assert_eq!(map.get(None, &key("a")).unwrap(), Some(val("a1")), "{}", strategy);
        assert_eq!(map.get(None, &key("b")).unwrap(), Some(val("b2")));
    }
}

// ============================================================================
// Invalidation
// ============================================================================

#[test]
fn test_invalidate_outside_transaction() {
    for strategy in STRATEGIES {
        let notifier = Arc::new(CollectingNotifier::default());
        let map: TransactionalMap<String, String> = CacheBuilder::new("inv")
            .strategy(strategy)
            .build_with(Arc::new(txmap_concurrency::EvictOnConflict), Some(notifier.clone()))
            .unwrap();
        map.put_all(
            None,
            vec![(key("a"), val("1")), (key("b"), val("2")), (key("c"), val("3"))],
        )
        .unwrap();

        let removed = map
            .invalidate(None, Arc::new(KeyFilter::new([key("a"), key("z")])), true)
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(map.len(None).unwrap(), 2);

        let events = notifier.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].cache_id.as_str(), "inv");
        assert!(events[0].filter.accept(&key("a"), &val("anything")));
    }
}

#[test]
fn test_invalidate_without_propagation_is_silent() {
    let notifier = Arc::new(CollectingNotifier::default());
    let map: TransactionalMap<String, String> = CacheBuilder::new("inv")
        .build_with(Arc::new(RetainOnConflict), Some(notifier.clone()))
        .unwrap();
    map.put(None, key("a"), val("1")).unwrap();

    assert_eq!(map.invalidate(None, Arc::new(AllEntriesFilter), false).unwrap(), 1);
    assert!(notifier.events.lock().is_empty());
}

#[test]
fn test_invalidate_in_transaction_is_private() {
    for strategy in STRATEGIES {
        let map = cache(strategy, true);
        map.put_all(None, vec![(key("a"), val("1")), (key("b"), val("22"))])
            .unwrap();
        let txn = TransactionManager::new().begin();

        let long_values = PredicateFilter::new(|_: &String, v: &String| v.len() > 1);
        assert_eq!(map.invalidate(tx(&txn), Arc::new(long_values), false).unwrap(), 1);
        assert_eq!(map.get(tx(&txn), &key("b")).unwrap(), None);
        assert_eq!(map.get(None, &key("b")).unwrap(), Some(val("22")));

        // An invalidated key is dirty: re-putting it does not fast-forward
        map.put(tx(&txn), key("b"), val("9")).unwrap();
        assert_eq!(map.get(None, &key("b")).unwrap(), Some(val("22")));

        txn.commit().unwrap();
        assert_eq!(map.get(None, &key("b")).unwrap(), Some(val("9")), "{}", strategy);
    }
}

#[test]
fn test_invalidated_absent_key_is_not_fast_forwarded() {
    for strategy in STRATEGIES {
        let map = cache(strategy, true);
        let txn = TransactionManager::new().begin();

        let filter = Arc::new(KeyFilter::new([key("k")]));
        assert_eq!(map.invalidate(tx(&txn), filter, false).unwrap(), 0);
        map.put(tx(&txn), key("k"), val("v")).unwrap();
        assert_eq!(map.get(tx(&txn), &key("k")).unwrap(), Some(val("v")));
        assert!(!map.shared().contains_key(&key("k")), "{}", strategy);

        txn.rollback().unwrap();
        assert_eq!(map.get(None, &key("k")).unwrap(), None, "{}", strategy);
    }
}

#[test]
fn test_keyless_invalidation_stops_fast_forward() {
    for strategy in STRATEGIES {
        let map = cache(strategy, true);
        let txn = TransactionManager::new().begin();

        assert_eq!(map.invalidate(tx(&txn), Arc::new(AllEntriesFilter), false).unwrap(), 0);
        map.put(tx(&txn), key("j"), val("v")).unwrap();
        assert!(!map.shared().contains_key(&key("j")), "{}", strategy);

        txn.rollback().unwrap();
        assert_eq!(map.get(None, &key("j")).unwrap(), None, "{}", strategy);
    }
}

#[test]
fn test_remote_invalidation_applies_event() {
    let notifier = Arc::new(CollectingNotifier::default());
    let origin: TransactionalMap<String, String> = CacheBuilder::new("shared")
        .build_with(Arc::new(RetainOnConflict), Some(notifier.clone()))
        .unwrap();
    let replica = cache(Strategy::CopyOnWrite, false);
    for map in [&origin, &replica] {
        map.put_all(None, vec![(key("a"), val("1")), (key("b"), val("2"))])
            .unwrap();
    }

    origin
        .invalidate(None, Arc::new(KeyFilter::new([key("b")])), true)
        .unwrap();
    for event in notifier.events.lock().drain(..) {
        assert_eq!(replica.apply_remote_invalidation(event.filter.as_ref()), 1);
    }

    assert_eq!(replica.get(None, &key("b")).unwrap(), None);
    assert_eq!(replica.get(None, &key("a")).unwrap(), Some(val("1")));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_cache_from_config_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(txmap_engine::CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "cache_id = \"users\"\nstrategy = \"copy-on-write\"\nno_transaction_policy = \"reject\"\n",
    )
    .unwrap();

    let config = CacheConfig::from_file(&path).unwrap();
    let map: TransactionalMap<String, String> = CacheBuilder::from_config(config).build().unwrap();
    assert_eq!(map.strategy(), Strategy::CopyOnWrite);
    assert!(matches!(
        map.put(None, key("k"), val("v")),
        Err(Error::NoActiveTransaction { .. })
    ));

    let txn = TransactionManager::new().begin();
    map.put(tx(&txn), key("k"), val("v")).unwrap();
    txn.commit().unwrap();
    assert_eq!(map.get(None, &key("k")).unwrap(), Some(val("v")));
}
