//! FIFO Cache Implementation

use crate::CacheError;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Capacity value that disables eviction
pub const UNBOUNDED: usize = 0;

/// Key/value store that evicts the oldest-inserted key once full.
///
/// Eviction order is insertion order, not access order: reading a key or
/// overwriting its value leaves its queue position untouched.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    /// Resident entries
    entries: HashMap<K, V>,
    /// Keys in insertion order (front = oldest)
    order: VecDeque<K>,
    /// Maximum number of keys (0 = unbounded)
    capacity: usize,
    /// Total evictions (for statistics)
    evicted: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a cache holding at most `capacity` keys (0 disables eviction)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            evicted: 0,
        }
    }

    /// Create a cache that never evicts
    pub fn unbounded() -> Self {
        Self::new(UNBOUNDED)
    }

    /// Look up a key
    pub fn get(&self, key: &K) -> Result<&V, CacheError> {
        self.entries.get(key).ok_or(CacheError::NotFound)
    }

    /// Look up a key for in-place modification
    pub fn get_mut(&mut self, key: &K) -> Result<&mut V, CacheError> {
        self.entries.get_mut(key).ok_or(CacheError::NotFound)
    }

    /// Insert or overwrite a value, evicting the oldest key if over capacity
    pub fn put(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);

        if self.is_bounded() && self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.evicted += 1;
            }
        }
    }

    /// Return the value for `key`, inserting `default()` first on a miss
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        if !self.entries.contains_key(&key) {
            self.put(key.clone(), default());
        }
        // The newest key is never the one evicted
        self.entries
            .get_mut(&key)
            .unwrap_or_else(|| unreachable!("key inserted above"))
    }

    /// Check whether a key is resident
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of resident keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity (0 = unbounded)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether eviction is enabled
    pub fn is_bounded(&self) -> bool {
        self.capacity != UNBOUNDED
    }

    /// Total keys evicted since creation
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_put_and_get() {
        let mut cache = BoundedCache::new(4);
        cache.put("a", 1);
        cache.put("b", 2);

        assert_eq!(cache.get(&"a"), Ok(&1));
        assert_eq!(cache.get(&"b"), Ok(&2));
        assert_eq!(cache.get(&"c"), Err(CacheError::NotFound));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut cache = BoundedCache::new(3);
        for key in 1..=4 {
            cache.put(key, key * 10);
        }

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert!(cache.contains(&3));
        assert!(cache.contains(&4));
        assert_eq!(cache.evicted(), 1);
    }

    #[test]
    fn test_access_does_not_refresh_position() {
        let mut cache = BoundedCache::new(2);
        cache.put("old", 1);
        cache.put("new", 2);

        // Neither reading nor overwriting moves "old" to the back
        let _ = cache.get(&"old");
        cache.put("old", 3);
        cache.put("newest", 4);

        assert!(!cache.contains(&"old"));
        assert!(cache.contains(&"new"));
        assert_eq!(cache.get(&"newest"), Ok(&4));
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut cache = BoundedCache::unbounded();
        for key in 0..1000 {
            cache.put(key, ());
        }

        assert_eq!(cache.len(), 1000);
        assert!(cache.contains(&0));
        assert_eq!(cache.evicted(), 0);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut cache: BoundedCache<u32, Vec<u32>> = BoundedCache::new(1);
        cache.get_or_insert_with(1, Vec::new).push(7);
        cache.get_or_insert_with(1, Vec::new).push(8);
        assert_eq!(cache.get(&1).map(Vec::len), Ok(2));

        cache.get_or_insert_with(2, Vec::new);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_clear() {
        let mut cache = BoundedCache::new(2);
        cache.put(1, 1);
        cache.clear();
        assert!(cache.is_empty());

        // Queue is reset too, so fresh inserts are not evicted early
        cache.put(2, 2);
        cache.put(3, 3);
        assert!(cache.contains(&2));
    }

    proptest! {
        #[test]
        fn prop_first_key_evicted_after_overflow(capacity in 1usize..64) {
            let mut cache = BoundedCache::new(capacity);
            for key in 0..=capacity {
                cache.put(key, key);
            }

            prop_assert!(!cache.contains(&0));
            for key in 1..=capacity {
                prop_assert!(cache.contains(&key));
            }
            prop_assert_eq!(cache.len(), capacity);
        }
    }
}
