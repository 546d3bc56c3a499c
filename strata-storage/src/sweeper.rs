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
    cmp::Reverse,
    io,
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use strata_common::{asyncify::asyncify, code::Key};

use crate::{
    error::Result,
    fs::{self, DirEntryMeta},
    store::DiskCacheInner,
};

pub(crate) const SWEEP_INITIAL_DELAY: Duration = Duration::from_secs(10);
pub(crate) const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// When the directory exceeds the size budget, sweep down to this share of
/// it so consecutive sweeps do not ping-pong around the limit.
const SWEEP_SIZE_TARGET_RATIO: f64 = 0.7;

/// Background reconciliation of the on-disk footprint against the size and
/// age budgets, using the file access stamps as an approximate LRU order.
pub(crate) struct Sweeper<K>
where
    K: Key,
{
    owner: Weak<DiskCacheInner<K>>,
}

impl<K> Sweeper<K>
where
    K: Key,
{
    pub(crate) fn spawn(owner: Weak<DiskCacheInner<K>>) {
        tokio::spawn(Self { owner }.run());
    }

    async fn run(self) {
        tokio::time::sleep(SWEEP_INITIAL_DELAY).await;
        loop {
            let Some(inner) = self.owner.upgrade() else {
                tracing::trace!("[sweeper] owner dropped, exit");
                return;
            };
            if let Err(e) = Self::sweep(&inner).await {
                tracing::warn!("[sweeper] sweep failed: {}", e);
            }
            drop(inner);
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    }

    async fn sweep(inner: &Arc<DiskCacheInner<K>>) -> Result<()> {
        let dir = inner.dir.clone();
        let size_limit = inner.size_limit;
        let expiration_timeout = inner.expiration_timeout;

        asyncify(move || {
            let now = SystemTime::now();
            let mut entries = fs::read_dir_meta(&dir)?;

            if let Some(deadline) = expiration_timeout.and_then(|timeout| now.checked_sub(timeout)) {
                entries.retain(|entry| {
                    if entry.accessed <= deadline {
                        tracing::trace!("[sweeper] expire {:?}", entry.path);
                        remove_entry(entry);
                        false
                    } else {
                        true
                    }
                });
            }

            let mut size: u64 = entries.iter().map(|entry| entry.allocated).sum();
            if size > size_limit {
                let target = (size_limit as f64 * SWEEP_SIZE_TARGET_RATIO) as u64;
                tracing::trace!("[sweeper] over budget: {} > {}, sweep to {}", size, size_limit, target);
                entries.sort_by_key(|entry| Reverse(entry.accessed));
                while size > target {
                    let Some(entry) = entries.pop() else { break };
                    remove_entry(&entry);
                    size = size.saturating_sub(entry.allocated);
                }
            }

            Ok(())
        })
        .await
    }
}

fn remove_entry(entry: &DirEntryMeta) {
    if let Err(e) = std::fs::remove_file(&entry.path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("[sweeper] failed to remove {:?}: {}", entry.path, e);
        }
    }
}
