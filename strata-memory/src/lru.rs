// Copyright 2025 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::ptr::{null_mut, NonNull};

use ahash::RandomState;
use hashbrown::HashMap;
use strata_common::code::Key;

struct Node<K, V> {
    key: K,
    value: V,
    cost: usize,
    prev: *mut Node<K, V>,
    next: *mut Node<K, V>,
}

/// Dual-limit LRU keyed map.
///
/// Entries are indexed by a hash map and ordered by insertion/update time in
/// a doubly-linked recency list. The list runs from the least recently
/// written entry at the head to the most recently written at the tail.
/// Eviction pops from the head while either positive limit is exceeded.
///
/// `get` does not refresh recency; only `set` does.
///
/// The nodes are owned by the map and freed when unlinked, so the list holds
/// plain back/next pointers rather than separate ownerships.
pub struct LruMap<K, V>
where
    K: Key,
{
    index: HashMap<K, NonNull<Node<K, V>>, RandomState>,

    head: *mut Node<K, V>,
    tail: *mut Node<K, V>,

    total_cost: usize,
    count_limit: usize,
    cost_limit: usize,
}

unsafe impl<K, V> Send for LruMap<K, V>
where
    K: Key,
    V: Send,
{
}
unsafe impl<K, V> Sync for LruMap<K, V>
where
    K: Key,
    V: Sync,
{
}

impl<K, V> LruMap<K, V>
where
    K: Key,
{
    /// Create a map with the given limits. A limit of `0` disables it.
    pub fn new(count_limit: usize, cost_limit: usize) -> Self {
        Self {
            index: HashMap::default(),
            head: null_mut(),
            tail: null_mut(),
            total_cost: 0,
            count_limit,
            cost_limit,
        }
    }

    /// Return the current value for `key` without refreshing its recency.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|ptr| unsafe { &ptr.as_ref().value })
    }

    /// Insert or update `key`, refresh its recency, then evict from the
    /// least recent end while either limit is exceeded.
    ///
    /// Updating an existing key always refreshes recency, even if the value
    /// and cost are unchanged.
    pub fn set(&mut self, key: K, value: V, cost: usize) {
        match self.index.get(&key).copied() {
            Some(mut ptr) => unsafe {
                let node = ptr.as_mut();
                self.total_cost = self.total_cost - node.cost + cost;
                node.value = value;
                node.cost = cost;
                self.unlink(ptr);
                self.push_tail(ptr);
            },
            None => {
                let node = Box::new(Node {
                    key: key.clone(),
                    value,
                    cost,
                    prev: null_mut(),
                    next: null_mut(),
                });
                let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(node)) };
                self.total_cost += cost;
                unsafe { self.push_tail(ptr) };
                self.index.insert(key, ptr);
            }
        }
        self.evict();
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let ptr = self.index.remove(key)?;
        unsafe {
            self.unlink(ptr);
            let node = Box::from_raw(ptr.as_ptr());
            self.total_cost -= node.cost;
            Some(node.value)
        }
    }

    pub fn clear(&mut self) {
        for (_, ptr) in self.index.drain() {
            unsafe { drop(Box::from_raw(ptr.as_ptr())) };
        }
        self.head = null_mut();
        self.tail = null_mut();
        self.total_cost = 0;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn count_limit(&self) -> usize {
        self.count_limit
    }

    pub fn cost_limit(&self) -> usize {
        self.cost_limit
    }

    /// Update the entry count limit. Takes effect on the next `set`.
    pub fn set_count_limit(&mut self, count_limit: usize) {
        self.count_limit = count_limit;
    }

    /// Update the total cost limit. Takes effect on the next `set`.
    pub fn set_cost_limit(&mut self, cost_limit: usize) {
        self.cost_limit = cost_limit;
    }

    fn evict(&mut self) {
        while (self.count_limit > 0 && self.index.len() > self.count_limit)
            || (self.cost_limit > 0 && self.total_cost > self.cost_limit)
        {
            let Some(ptr) = NonNull::new(self.head) else {
                break;
            };
            unsafe {
                self.unlink(ptr);
                let node = Box::from_raw(ptr.as_ptr());
                self.index.remove(&node.key);
                self.total_cost -= node.cost;
            }
        }
    }

    unsafe fn unlink(&mut self, ptr: NonNull<Node<K, V>>) {
        let node = ptr.as_ptr();
        let prev = (*node).prev;
        let next = (*node).next;

        if prev.is_null() {
            self.head = next;
        } else {
            (*prev).next = next;
        }
        if next.is_null() {
            self.tail = prev;
        } else {
            (*next).prev = prev;
        }

        (*node).prev = null_mut();
        (*node).next = null_mut();
    }

    unsafe fn push_tail(&mut self, ptr: NonNull<Node<K, V>>) {
        let node = ptr.as_ptr();
        (*node).prev = self.tail;
        (*node).next = null_mut();

        if self.tail.is_null() {
            self.head = node;
        } else {
            (*self.tail).next = node;
        }
        self.tail = node;
    }

    #[cfg(test)]
    fn dump(&self) -> Vec<(K, usize)> {
        let mut res = vec![];
        let mut cur = self.head;
        while !cur.is_null() {
            unsafe {
                res.push(((*cur).key.clone(), (*cur).cost));
                cur = (*cur).next;
            }
        }
        res
    }
}

impl<K, V> Drop for LruMap<K, V>
where
    K: Key,
{
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_eviction_order_by_count() {
        let mut lru = LruMap::new(3, 0);
        for i in 0..10u64 {
            lru.set(i, i, 0);
        }
        // The survivors are the most recently set keys.
        assert_eq!(lru.dump().into_iter().map(|(k, _)| k).collect_vec(), vec![7, 8, 9]);
        assert_eq!(lru.len(), 3);
        assert!(lru.get(&6).is_none());
        assert_eq!(lru.get(&9), Some(&9));
    }

    #[test]
    fn test_get_does_not_refresh_recency() {
        let mut lru = LruMap::new(3, 0);
        lru.set("a", 1, 0);
        lru.set("b", 2, 0);
        lru.set("c", 3, 0);

        assert_eq!(lru.get(&"a"), Some(&1));
        lru.set("d", 4, 0);

        // "a" was read but not rewritten, so it is still the eviction victim.
        assert!(lru.get(&"a").is_none());
        assert_eq!(lru.dump().into_iter().map(|(k, _)| k).collect_vec(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_update_refreshes_recency_and_adjusts_cost() {
        let mut lru = LruMap::new(0, 10);
        lru.set("a", 1, 4);
        lru.set("b", 2, 4);
        assert_eq!(lru.total_cost(), 8);

        // Same value, same cost: recency still refreshes.
        lru.set("a", 1, 4);
        assert_eq!(lru.dump().into_iter().map(|(k, _)| k).collect_vec(), vec!["b", "a"]);

        lru.set("a", 1, 2);
        assert_eq!(lru.total_cost(), 6);
    }

    #[test]
    fn test_cost_eviction() {
        // countLimit = 2, totalCostLimit = 3.
        let mut lru = LruMap::new(2, 3);
        lru.set(1, 1, 3);
        lru.set(2, 2, 2);
        lru.set(3, 3, 1);
        lru.set(1, 1, 3);

        assert_eq!(lru.dump(), vec![(1, 3)]);
        assert_eq!(lru.total_cost(), 3);
        assert!(lru.get(&2).is_none());
        assert!(lru.get(&3).is_none());
    }

    #[test]
    fn test_zero_limit_disables() {
        let mut lru = LruMap::new(0, 0);
        for i in 0..1000u64 {
            lru.set(i, vec![0u8; 8], 8);
        }
        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.total_cost(), 8000);
    }

    #[test]
    fn test_limits_apply_on_next_set() {
        let mut lru = LruMap::new(0, 0);
        for i in 0..8u64 {
            lru.set(i, i, 1);
        }
        lru.set_count_limit(2);
        assert_eq!(lru.len(), 8);

        lru.set(8, 8, 1);
        assert_eq!(lru.dump().into_iter().map(|(k, _)| k).collect_vec(), vec![7, 8]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut lru = LruMap::new(0, 0);
        lru.set("a", 1, 5);
        lru.set("b", 2, 7);

        assert_eq!(lru.remove(&"a"), Some(1));
        assert_eq!(lru.remove(&"a"), None);
        assert_eq!(lru.total_cost(), 7);

        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.total_cost(), 0);
        assert!(lru.get(&"b").is_none());
    }
}
