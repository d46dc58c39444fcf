//! Bounded least-recently-used map.
//!
//! Every access stamps the entry with a monotonically increasing tick; the
//! ordered `recency` index maps ticks back to keys so the oldest entry is
//! always the first one.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    tick: u64,
}

/// Fixed-capacity map that evicts the least recently used entry.
#[derive(Debug)]
pub struct RecencyCache<K, V> {
    capacity: usize,
    slots: HashMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
    clock: u64,
}

impl<K, V> RecencyCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// A cache holding at most `capacity` entries. A capacity of zero is
    /// treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(&slot.value)
    }

    /// Look up `key` without touching its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Insert or replace `key` as most recently used. Returns the entries
    /// evicted to stay within capacity.
    pub fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        let tick = self.next_tick();
        if let Some(old) = self.slots.insert(key.clone(), Slot { value, tick }) {
            self.recency.remove(&old.tick);
        }
        self.recency.insert(tick, key);

        let mut evicted = Vec::new();
        while self.slots.len() > self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if let Some(slot) = self.slots.remove(&oldest) {
                evicted.push((oldest, slot.value));
            }
        }
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.value)
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.slots.len();
        self.slots.clear();
        self.recency.clear();
        removed
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        self.recency.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = RecencyCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));

        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("b", 2)]);
        assert_eq!(cache.keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = RecencyCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.peek(&"a"), Some(&1));

        let evicted = cache.insert("c", 3);
        assert_eq!(evicted, vec![("a", 1)]);
    }

    #[test]
    fn test_replace_refreshes_without_growth() {
        let mut cache = RecencyCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.insert("a", 10).is_empty());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec!["b", "a"]);
        assert_eq!(cache.peek(&"a"), Some(&10));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = RecencyCache::new(3);
        cache.insert(1, "x");
        cache.insert(2, "y");
        assert_eq!(cache.remove(&1), Some("x"));
        assert_eq!(cache.remove(&1), None);
        assert_eq!(cache.keys(), vec![2]);
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = RecencyCache::new(0);
        cache.insert(1, ());
        cache.insert(2, ());
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.keys(), vec![2]);
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_capacity(
            capacity in 1usize..8,
            ops in prop::collection::vec((0u8..16, any::<bool>()), 0..64),
        ) {
            let mut cache = RecencyCache::new(capacity);
            for (key, is_read) in ops {
                if is_read {
                    let _ = cache.get(&key);
                } else {
                    cache.insert(key, u32::from(key));
                }
                prop_assert!(cache.len() <= capacity);
                prop_assert_eq!(cache.keys().len(), cache.len());
            }
        }

        #[test]
        fn prop_most_recent_insert_survives(
            capacity in 1usize..8,
            keys in prop::collection::vec(0u8..32, 1..64),
        ) {
            let mut cache = RecencyCache::new(capacity);
            for key in &keys {
                cache.insert(*key, ());
            }
            let last = keys[keys.len() - 1];
            prop_assert!(cache.contains_key(&last));
            prop_assert_eq!(cache.keys().last().copied(), Some(last));
        }
    }
}
