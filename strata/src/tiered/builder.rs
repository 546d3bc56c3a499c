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

use std::{fmt::Display, marker::PhantomData, sync::Arc, time::Duration};

use strata_common::{
    code::{Key, Value},
    queue::OperationQueue,
};
use strata_memory::{MemoryCache, MemoryCacheBuilder};
use strata_storage::{digest_filename, CachePath, DiskCacheBuilder, FilenameFn};

use crate::tiered::{cache::TieredCache, error::Result};

/// Tiered cache builder.
pub struct TieredCacheBuilder<K, V>
where
    K: Key,
    V: Value,
{
    name: String,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> TieredCacheBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a new tiered cache builder.
    ///
    /// The name becomes the default cache directory name under the platform
    /// caches directory.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    /// Continue to modify the memory tier configuration.
    pub fn memory(self) -> TieredCacheBuilderPhaseMemory<K, V> {
        TieredCacheBuilderPhaseMemory {
            name: self.name,
            builder: MemoryCacheBuilder::new().with_weighter(|_, value: &V| value.weight()),
        }
    }
}

/// Tiered cache builder to modify the memory tier configuration.
pub struct TieredCacheBuilderPhaseMemory<K, V>
where
    K: Key,
    V: Value,
{
    name: String,
    builder: MemoryCacheBuilder<K, V>,
}

impl<K, V> TieredCacheBuilderPhaseMemory<K, V>
where
    K: Key,
    V: Value,
{
    /// Set the memory tier entry count limit.
    ///
    /// Default: `0` (unlimited).
    pub fn with_count_limit(self, count_limit: usize) -> Self {
        Self {
            name: self.name,
            builder: self.builder.with_count_limit(count_limit),
        }
    }

    /// Set the memory tier total cost limit. Byte-typed values cost their
    /// length; other values cost their [`Value::weight`].
    ///
    /// Default: `0` (unlimited).
    pub fn with_cost_limit(self, cost_limit: usize) -> Self {
        Self {
            name: self.name,
            builder: self.builder.with_cost_limit(cost_limit),
        }
    }

    /// Continue to modify the disk tier configuration.
    pub fn storage(self) -> TieredCacheBuilderPhaseStorage<K, V> {
        TieredCacheBuilderPhaseStorage {
            name: self.name,
            memory: self.builder.build(),
            path: None,
            filename: None,
            size_limit: None,
            expiration_timeout: None,
        }
    }
}

/// Tiered cache builder to modify the disk tier configuration.
pub struct TieredCacheBuilderPhaseStorage<K, V>
where
    K: Key,
    V: Value,
{
    name: String,
    memory: MemoryCache<K, V>,
    path: Option<CachePath>,
    filename: Option<FilenameFn<K>>,
    size_limit: Option<u64>,
    expiration_timeout: Option<Duration>,
}

impl<K, V> TieredCacheBuilderPhaseStorage<K, V>
where
    K: Key,
    V: Value,
{
    /// Set the location of the backing directory.
    ///
    /// Default: [`CachePath::Default`] with the builder name.
    pub fn with_path(mut self, path: CachePath) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the filename projection for keys.
    ///
    /// Default: digest of the key's `Display` projection.
    pub fn with_filename(mut self, filename: impl Fn(&K) -> Option<String> + Send + Sync + 'static) -> Self {
        self.filename = Some(Arc::new(filename));
        self
    }

    /// Set the disk tier size budget in bytes.
    ///
    /// Default: 150 MiB.
    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = Some(size_limit);
        self
    }

    /// Drop disk entries unused for longer than the timeout.
    ///
    /// Default: unset.
    pub fn with_expiration_timeout(mut self, expiration_timeout: Duration) -> Self {
        self.expiration_timeout = Some(expiration_timeout);
        self
    }

    /// Build and open the tiered cache with the given configuration.
    pub async fn build(self) -> Result<TieredCache<K, V>>
    where
        K: Display,
    {
        let path = self.path.unwrap_or(CachePath::Default(self.name));
        let filename = self
            .filename
            .unwrap_or_else(|| Arc::new(|key: &K| digest_filename(&key.to_string())));

        let mut builder = DiskCacheBuilder::new(path, move |key: &K| filename(key));
        if let Some(size_limit) = self.size_limit {
            builder = builder.with_size_limit(size_limit);
        }
        if let Some(expiration_timeout) = self.expiration_timeout {
            builder = builder.with_expiration_timeout(expiration_timeout);
        }
        let disk = builder.build().await?;

        Ok(TieredCache {
            memory: self.memory,
            disk,
            queue: Arc::new(OperationQueue::new()),
        })
    }
}
