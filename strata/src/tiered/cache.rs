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

use std::{fmt::Debug, sync::Arc, time::SystemTime};

use strata_common::{
    code::{Key, Value},
    queue::OperationQueue,
};
use strata_memory::MemoryCache;
use strata_storage::DiskCache;
use tokio::task::JoinHandle;

use crate::tiered::error::Result;

/// A two-tier cache joining a memory tier and a disk tier.
///
/// Reads consult memory first, then disk; a disk hit is decoded and fed back
/// into the memory tier. Writes run against both tiers and are linearized
/// per cache instance by an operation queue, so a completed `store` is
/// observable by any subsequent `get` even while the disk write is pending.
pub struct TieredCache<K, V>
where
    K: Key,
    V: Value,
{
    pub(crate) memory: MemoryCache<K, V>,
    pub(crate) disk: DiskCache<K>,
    pub(crate) queue: Arc<OperationQueue>,
}

impl<K, V> Debug for TieredCache<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("memory", &self.memory)
            .field("disk", &self.disk)
            .finish()
    }
}

impl<K, V> Clone for TieredCache<K, V>
where
    K: Key,
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<K, V> TieredCache<K, V>
where
    K: Key,
    V: Value,
{
    /// The memory tier.
    pub fn memory(&self) -> &MemoryCache<K, V> {
        &self.memory
    }

    /// The disk tier.
    pub fn disk(&self) -> &DiskCache<K> {
        &self.disk
    }

    /// Look up the value for `key`.
    ///
    /// A disk hit is decoded and populates the memory tier, best effort. A
    /// payload that fails to decode surfaces as an error and does not
    /// populate the memory tier.
    pub async fn get(&self, key: &K) -> Result<Option<V>>
    where
        V: Clone,
    {
        self.queue.wait().await;

        if let Some(value) = self.memory.get(key).await {
            return Ok(Some(value));
        }

        let Some(bytes) = self.disk.get(key, SystemTime::now()).await? else {
            return Ok(None);
        };
        let value = V::decode(bytes)?;
        let _ = self.memory.store(key.clone(), value.clone());
        Ok(Some(value))
    }

    /// Store `value` for `key` in both tiers.
    ///
    /// The returned handle completes when both tiers have applied the
    /// change; the disk half is staged, not yet flushed. When the value
    /// fails to encode, only the memory half applies and the failure is
    /// logged.
    pub fn store(&self, key: K, value: V) -> JoinHandle<()> {
        let encoded = match value.encode() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("[cache] drop disk write for {:?}: {}", key, e);
                None
            }
        };
        let memory = self.memory.clone();
        let disk = self.disk.clone();
        self.queue.enqueue(async move {
            let memory_handle = memory.store(key.clone(), value);
            match encoded.map(|bytes| disk.store(key, bytes)) {
                Some(disk_handle) => {
                    let _ = tokio::join!(memory_handle, disk_handle);
                }
                None => {
                    let _ = memory_handle.await;
                }
            }
        })
    }

    /// Remove the value for `key` from both tiers.
    pub fn remove(&self, key: K) -> JoinHandle<()> {
        let memory = self.memory.clone();
        let disk = self.disk.clone();
        self.queue.enqueue(async move {
            let memory_handle = memory.remove(key.clone());
            let disk_handle = disk.remove(key);
            let _ = tokio::join!(memory_handle, disk_handle);
        })
    }

    /// Remove every value from both tiers.
    pub fn clear(&self) -> JoinHandle<()> {
        let memory = self.memory.clone();
        let disk = self.disk.clone();
        self.queue.enqueue(async move {
            let memory_handle = memory.clear();
            let disk_handle = disk.clear();
            let _ = tokio::join!(memory_handle, disk_handle);
        })
    }

    /// Whether either tier holds a value for `key`, without decoding it.
    pub async fn contains(&self, key: &K) -> Result<bool>
    where
        V: Clone,
    {
        self.queue.wait().await;

        if self.memory.get(key).await.is_some() {
            return Ok(true);
        }
        Ok(self.disk.get(key, SystemTime::now()).await?.is_some())
    }
}
