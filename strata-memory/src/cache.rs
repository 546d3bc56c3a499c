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

use std::{fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use strata_common::{code::Key, queue::OperationQueue};
use tokio::task::JoinHandle;

use crate::lru::LruMap;

/// Weighter of the cached entries.
pub trait Weighter<K, V>: Fn(&K, &V) -> usize + Send + Sync + 'static {}
impl<K, V, T> Weighter<K, V> for T where T: Fn(&K, &V) -> usize + Send + Sync + 'static {}

/// Memory cache builder.
pub struct MemoryCacheBuilder<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    count_limit: usize,
    cost_limit: usize,
    weighter: Arc<dyn Fn(&K, &V) -> usize + Send + Sync>,
}

impl<K, V> Default for MemoryCacheBuilder<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryCacheBuilder<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            count_limit: 0,
            cost_limit: 0,
            weighter: Arc::new(|_, _| 0),
        }
    }

    /// Set the entry count limit.
    ///
    /// Default: `0` (unlimited).
    pub fn with_count_limit(mut self, count_limit: usize) -> Self {
        self.count_limit = count_limit;
        self
    }

    /// Set the total cost limit.
    ///
    /// Default: `0` (unlimited).
    pub fn with_cost_limit(mut self, cost_limit: usize) -> Self {
        self.cost_limit = cost_limit;
        self
    }

    /// Set the weighter that attributes a cost to each entry.
    ///
    /// Default: every entry weighs `0`.
    pub fn with_weighter(mut self, weighter: impl Weighter<K, V>) -> Self {
        self.weighter = Arc::new(weighter);
        self
    }

    pub fn build(self) -> MemoryCache<K, V> {
        MemoryCache {
            inner: Arc::new(MemoryCacheInner {
                map: Mutex::new(LruMap::new(self.count_limit, self.cost_limit)),
                queue: OperationQueue::new(),
                weighter: self.weighter,
            }),
        }
    }
}

struct MemoryCacheInner<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    map: Mutex<LruMap<K, V>>,
    queue: OperationQueue,
    weighter: Arc<dyn Fn(&K, &V) -> usize + Send + Sync>,
}

/// Concurrency envelope around [`LruMap`].
///
/// Mutations are serialized by an [`OperationQueue`] and return handles that
/// complete when the change has been applied. `get` awaits the queue tail
/// first so that a preceding `store` is visible.
pub struct MemoryCache<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    inner: Arc<MemoryCacheInner<K, V>>,
}

impl<K, V> Debug for MemoryCache<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("count", &self.inner.map.lock().len())
            .finish()
    }
}

impl<K, V> Clone for MemoryCache<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> MemoryCache<K, V>
where
    K: Key,
    V: Send + Sync + 'static,
{
    pub fn builder() -> MemoryCacheBuilder<K, V> {
        MemoryCacheBuilder::new()
    }

    pub async fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.queue.wait().await;
        self.inner.map.lock().get(key).cloned()
    }

    pub fn store(&self, key: K, value: V) -> JoinHandle<()> {
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            let cost = (inner.weighter)(&key, &value);
            inner.map.lock().set(key, value, cost);
        })
    }

    pub fn remove(&self, key: K) -> JoinHandle<()> {
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            inner.map.lock().remove(&key);
        })
    }

    pub fn clear(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            inner.map.lock().clear();
        })
    }

    pub fn count(&self) -> usize {
        self.inner.map.lock().len()
    }

    pub fn total_cost(&self) -> usize {
        self.inner.map.lock().total_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_is_visible_to_get() {
        let cache: MemoryCache<String, Vec<u8>> = MemoryCache::builder().build();

        // `get` awaits the queue tail, so the handle need not be awaited.
        let _handle = cache.store("k".to_string(), vec![1, 2, 3]);
        assert_eq!(cache.get(&"k".to_string()).await, Some(vec![1, 2, 3]));

        cache.remove("k".to_string()).await.unwrap();
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_weighter_drives_cost_eviction() {
        let cache: MemoryCache<u64, Vec<u8>> = MemoryCache::builder()
            .with_cost_limit(8)
            .with_weighter(|_, v: &Vec<u8>| v.len())
            .build();

        cache.store(1, vec![0u8; 4]).await.unwrap();
        cache.store(2, vec![0u8; 4]).await.unwrap();
        cache.store(3, vec![0u8; 4]).await.unwrap();

        assert_eq!(cache.count(), 2);
        assert!(cache.total_cost() <= 8);
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&3).await, Some(vec![0u8; 4]));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache: MemoryCache<u64, u64> = MemoryCache::builder().build();
        for i in 0..16 {
            cache.store(i, i).await.unwrap();
        }
        cache.clear().await.unwrap();
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.get(&7).await, None);
    }
}
