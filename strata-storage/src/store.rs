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

use std::{
    collections::HashMap,
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use bytes::Bytes;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use strata_common::{asyncify::asyncify, code::Key, queue::OperationQueue};
use tokio::task::JoinHandle;

use crate::{
    error::Result,
    fs::{self, CachePath, FilenameFn},
    staging::{Staged, StagingLog},
    sweeper::Sweeper,
};

/// Default size budget enforced by the sweeper: 150 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 150 * 1024 * 1024;

/// An in-flight per-key I/O task. Readers of the key await it so they
/// observe the post-I/O state; the flusher awaits it for the outcome.
pub(crate) type RunningTask = Shared<BoxFuture<'static, bool>>;

/// Disk cache builder.
pub struct DiskCacheBuilder<K>
where
    K: Key,
{
    path: CachePath,
    filename: FilenameFn<K>,
    size_limit: u64,
    expiration_timeout: Option<Duration>,
}

impl<K> DiskCacheBuilder<K>
where
    K: Key,
{
    pub fn new(path: CachePath, filename: impl Fn(&K) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            path,
            filename: Arc::new(filename),
            size_limit: DEFAULT_SIZE_LIMIT,
            expiration_timeout: None,
        }
    }

    /// Set the size budget in bytes.
    ///
    /// Default: 150 MiB.
    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    /// Drop entries whose access stamp is older than the timeout.
    ///
    /// Default: unset.
    pub fn with_expiration_timeout(mut self, expiration_timeout: Duration) -> Self {
        self.expiration_timeout = Some(expiration_timeout);
        self
    }

    /// Resolve the backing directory and arm the sweeper.
    ///
    /// Fails when [`CachePath::Default`] is used and no platform caches
    /// directory is discoverable. Intermediate directories are created
    /// lazily on first write.
    pub async fn build(self) -> Result<DiskCache<K>> {
        let dir = self.path.resolve()?;
        let inner = Arc::new(DiskCacheInner {
            dir,
            filename: self.filename,
            size_limit: self.size_limit,
            expiration_timeout: self.expiration_timeout,
            queue: OperationQueue::new(),
            state: Mutex::new(FlushState {
                staging: StagingLog::new(),
                running: HashMap::new(),
                flush_needed: false,
                flush_scheduled: false,
                flushing: None,
            }),
        });
        Sweeper::spawn(Arc::downgrade(&inner));
        Ok(DiskCache { inner })
    }
}

pub(crate) struct FlushState<K>
where
    K: Key,
{
    pub staging: StagingLog<K>,
    pub running: HashMap<K, RunningTask>,
    pub flush_needed: bool,
    pub flush_scheduled: bool,
    pub flushing: Option<Shared<BoxFuture<'static, ()>>>,
}

pub(crate) struct DiskCacheInner<K>
where
    K: Key,
{
    pub dir: PathBuf,
    pub filename: FilenameFn<K>,
    pub size_limit: u64,
    pub expiration_timeout: Option<Duration>,

    pub queue: OperationQueue,
    pub state: Mutex<FlushState<K>>,
}

impl<K> DiskCacheInner<K>
where
    K: Key,
{
    pub(crate) fn path_of(&self, key: &K) -> Option<PathBuf> {
        (self.filename)(key).map(|name| self.dir.join(name))
    }
}

/// Persistent cache tier over a flat directory of files.
///
/// Mutations are staged and written back in deferred batches; reads resolve
/// through the staging log so the latest logical value is observable before
/// the physical write lands.
pub struct DiskCache<K>
where
    K: Key,
{
    pub(crate) inner: Arc<DiskCacheInner<K>>,
}

impl<K> Debug for DiskCache<K>
where
    K: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache").field("dir", &self.inner.dir).finish()
    }
}

impl<K> Clone for DiskCache<K>
where
    K: Key,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K> DiskCache<K>
where
    K: Key,
{
    /// Look up the payload for `key`.
    ///
    /// The staging log is consulted first, newest stage first; a staged
    /// tombstone reads as a miss. A key with an in-flight write is awaited
    /// before the file is read. `now` stamps the entry's access date on a
    /// hit, best effort.
    pub async fn get(&self, key: &K, now: SystemTime) -> Result<Option<Bytes>> {
        self.inner.queue.wait().await;

        let running = {
            let state = self.inner.state.lock();
            match state.staging.resolve(key) {
                Some(Staged::Value(bytes)) => return Ok(Some(bytes)),
                Some(Staged::Tombstone) => return Ok(None),
                None => state.running.get(key).cloned(),
            }
        };
        if let Some(task) = running {
            task.await;
        }

        let Some(path) = self.path_of(key) else {
            return Ok(None);
        };
        let bytes = asyncify(move || match std::fs::read(&path) {
            Ok(bytes) => {
                fs::touch(&path, now);
                Ok(Some(Bytes::from(bytes)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        })
        .await?;
        Ok(bytes)
    }

    /// Stage `bytes` for `key` and arm the deferred flush.
    ///
    /// The returned handle completes once the change is staged; the write
    /// itself lands with the next flush.
    pub fn store(&self, key: K, bytes: impl Into<Bytes>) -> JoinHandle<()> {
        let bytes = bytes.into();
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            inner.state.lock().staging.add(key, bytes);
            inner.set_needs_flush();
        })
    }

    /// Stage a tombstone for `key` and arm the deferred flush.
    pub fn remove(&self, key: K) -> JoinHandle<()> {
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            inner.state.lock().staging.remove(key);
            inner.set_needs_flush();
        })
    }

    /// Stage the removal of every entry and arm the deferred flush.
    pub fn clear(&self) -> JoinHandle<()> {
        let inner = self.inner.clone();
        self.inner.queue.enqueue(async move {
            inner.state.lock().staging.remove_all();
            inner.set_needs_flush();
        })
    }

    /// Path of the entry for `key`, or `None` when the filename function
    /// yields nothing for it.
    pub fn path_of(&self, key: &K) -> Option<PathBuf> {
        self.inner.path_of(key)
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Number of entries on disk.
    pub async fn total_count(&self) -> Result<usize> {
        let dir = self.inner.dir.clone();
        let entries = asyncify(move || fs::read_dir_meta(&dir)).await?;
        Ok(entries.len())
    }

    /// Total byte length of the entries on disk.
    pub async fn total_size(&self) -> Result<u64> {
        let dir = self.inner.dir.clone();
        let entries = asyncify(move || fs::read_dir_meta(&dir)).await?;
        Ok(entries.iter().map(|entry| entry.len).sum())
    }

    /// Total allocated size of the entries on disk.
    pub async fn total_allocated_size(&self) -> Result<u64> {
        let dir = self.inner.dir.clone();
        let entries = asyncify(move || fs::read_dir_meta(&dir)).await?;
        Ok(entries.iter().map(|entry| entry.allocated).sum())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn builder(dir: &Path) -> DiskCacheBuilder<String> {
        DiskCacheBuilder::new(CachePath::Custom(dir.into()), |key: &String| {
            fs::digest_filename(key)
        })
    }

    fn file_count(dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(iter) => iter.count(),
            Err(_) => 0,
        }
    }

    async fn drain(mut condition: impl FnMut() -> bool) {
        for _ in 0..4000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("drain timed out");
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_visible_before_flush() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        cache.store("empty".to_string(), Bytes::new()).await.unwrap();
        // The empty payload is valid and observable from staging.
        let got = cache.get(&"empty".to_string(), SystemTime::now()).await.unwrap();
        assert_eq!(got, Some(Bytes::new()));
        assert_eq!(file_count(dir.path()), 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert_eq!(file_count(dir.path()), 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        drain(|| file_count(dir.path()) == 1).await;
        let got = cache.get(&"empty".to_string(), SystemTime::now()).await.unwrap();
        assert_eq!(got, Some(Bytes::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batched_writes_share_a_stage() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        cache.store("item0".to_string(), Bytes::from_static(&[1])).await.unwrap();
        cache
            .store("item1".to_string(), Bytes::from_static(&[1, 2]))
            .await
            .unwrap();
        {
            let state = cache.inner.state.lock();
            assert_eq!(state.staging.len(), 1);
            assert_eq!(state.staging.oldest().unwrap().changes.len(), 2);
        }

        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| file_count(dir.path()) == 2).await;
        assert!(cache.inner.state.lock().staging.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_remove_supersedes_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        cache.store("item0".to_string(), Bytes::from_static(&[1])).await.unwrap();
        cache
            .store("item1".to_string(), Bytes::from_static(&[1, 2]))
            .await
            .unwrap();
        cache.remove("item0".to_string()).await.unwrap();
        assert_eq!(cache.inner.state.lock().staging.len(), 2);
        assert_eq!(
            cache.get(&"item0".to_string(), SystemTime::now()).await.unwrap(),
            None
        );

        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| file_count(dir.path()) == 1).await;
        drain(|| cache.inner.state.lock().staging.is_empty()).await;

        assert_eq!(
            cache.get(&"item0".to_string(), SystemTime::now()).await.unwrap(),
            None
        );
        assert_eq!(
            cache.get(&"item1".to_string(), SystemTime::now()).await.unwrap(),
            Some(Bytes::from_static(&[1, 2]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_masks_and_empties_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        cache.store("item0".to_string(), Bytes::from_static(&[1])).await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| file_count(dir.path()) == 1).await;
        assert_eq!(
            cache.get(&"item0".to_string(), SystemTime::now()).await.unwrap(),
            Some(Bytes::from_static(&[1]))
        );

        cache.clear().await.unwrap();
        assert!(!cache.inner.state.lock().staging.is_empty());
        // The tombstone masks the file before the flush lands.
        assert_eq!(
            cache.get(&"item0".to_string(), SystemTime::now()).await.unwrap(),
            None
        );

        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| file_count(dir.path()) == 0).await;
        drain(|| cache.inner.state.lock().staging.is_empty()).await;
        assert_eq!(
            cache.get(&"item0".to_string(), SystemTime::now()).await.unwrap(),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_filename_less_keys_skip_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        assert_eq!(cache.path_of(&String::new()), None);
        cache.store(String::new(), Bytes::from_static(&[1])).await.unwrap();
        // Observable from staging until the flush acks it away.
        assert_eq!(
            cache.get(&String::new(), SystemTime::now()).await.unwrap(),
            Some(Bytes::from_static(&[1]))
        );

        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| cache.inner.state.lock().staging.is_empty()).await;
        assert_eq!(file_count(dir.path()), 0);
        assert_eq!(cache.get(&String::new(), SystemTime::now()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_totals() {
        let dir = tempfile::tempdir().unwrap();
        let cache = builder(dir.path()).build().await.unwrap();

        cache.store("a".to_string(), Bytes::from_static(&[0; 10])).await.unwrap();
        cache.store("b".to_string(), Bytes::from_static(&[0; 20])).await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        drain(|| file_count(dir.path()) == 2).await;

        assert_eq!(cache.total_count().await.unwrap(), 2);
        assert_eq!(cache.total_size().await.unwrap(), 30);
        assert!(cache.total_allocated_size().await.unwrap() >= 30);
    }
}
