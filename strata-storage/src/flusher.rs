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

use std::{io, path::PathBuf, sync::Arc, time::Duration};

use futures::{future::join_all, FutureExt};
use itertools::Itertools;
use strata_common::{asyncify::asyncify, code::Key};
use tokio::sync::oneshot;

use crate::{
    staging::{ChangeOp, Stage},
    store::{DiskCacheInner, RunningTask},
};

/// Debounce between the first staged change and the flush that drains it.
pub(crate) const FLUSH_DELAY: Duration = Duration::from_secs(1);

impl<K> DiskCacheInner<K>
where
    K: Key,
{
    /// Arm the deferred flush. Idempotent while a flush is already pending.
    ///
    /// The scheduled task sleeps out the debounce, waits for the previous
    /// flush task, and then drains the staging log. It holds the owner
    /// weakly, so dropping the cache stops the chain.
    pub(crate) fn set_needs_flush(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.flush_needed {
            return;
        }
        state.flush_needed = true;

        let prev = state.flushing.take();
        let weak = Arc::downgrade(self);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(FLUSH_DELAY).await;
            if let Some(prev) = prev {
                prev.await;
            }
            if let Some(this) = weak.upgrade() {
                this.flush().await;
            }
            let _ = done_tx.send(());
        });
        state.flushing = Some(async move { let _ = done_rx.await; }.boxed().shared());
    }

    async fn flush(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.flush_needed = false;
            if state.flush_scheduled {
                return;
            }
            state.flush_scheduled = true;
        }

        self.flush_changes().await;

        self.state.lock().flush_scheduled = false;
    }

    /// Drain the staging log oldest stage first.
    ///
    /// Failed changes are left in their stage, so the attempt budget is
    /// bounded by the stage count at entry; whatever remains waits for the
    /// next flush trigger.
    async fn flush_changes(&self) {
        let mut attempts = self.state.lock().staging.len();
        tracing::trace!("[flusher] flush {} stages", attempts);

        while attempts > 0 {
            let stage = match self.state.lock().staging.oldest() {
                Some(stage) => stage.clone(),
                None => break,
            };
            let stage_id = stage.id;

            if let Some(flushed) = self.flush_stage(stage).await {
                self.state.lock().staging.flushed(stage_id, &flushed);
            }
            attempts -= 1;
        }
    }

    /// Flush a single stage with one concurrent I/O task per change.
    ///
    /// Returns the changes that reached the disk, or `None` when a
    /// `remove_all` stage failed wholesale.
    async fn flush_stage(&self, stage: Stage<K>) -> Option<Vec<(K, u64)>> {
        if stage.remove_all {
            return self.flush_remove_all_stage(stage).await;
        }

        // Keys without a filename have nothing to write and ack right away.
        let mut flushed = vec![];
        let mut tasks = vec![];
        {
            let mut state = self.state.lock();
            for (key, change) in stage.changes {
                let Some(path) = self.path_of(&key) else {
                    flushed.push((key, change.id));
                    continue;
                };
                let task = io_task(path, change.op);
                debug_assert!(
                    !state.running.contains_key(&key),
                    "multiple in-flight tasks for one key"
                );
                state.running.insert(key.clone(), task.clone());
                tasks.push((key, change.id, task));
            }
        }

        let outcomes = join_all(tasks.iter().map(|(_, _, task)| task.clone())).await;

        let mut state = self.state.lock();
        for ((key, change_id, _), ok) in tasks.into_iter().zip(outcomes) {
            state.running.remove(&key);
            if ok {
                flushed.push((key, change_id));
            }
        }

        Some(flushed)
    }

    /// A `remove_all` stage collapses to a single task that deletes the
    /// directory and recreates it, registered under every key of the stage.
    async fn flush_remove_all_stage(&self, stage: Stage<K>) -> Option<Vec<(K, u64)>> {
        let dir = self.dir.clone();
        let task: RunningTask = async move {
            let res = asyncify(move || {
                match std::fs::remove_dir_all(&dir) {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                    _ => {}
                }
                std::fs::create_dir_all(&dir)
            })
            .await;
            match res {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("[flusher] remove all failed: {}", e);
                    false
                }
            }
        }
        .boxed()
        .shared();

        {
            let mut state = self.state.lock();
            for key in stage.changes.keys() {
                debug_assert!(
                    !state.running.contains_key(key),
                    "multiple in-flight tasks for one key"
                );
                state.running.insert(key.clone(), task.clone());
            }
        }

        let ok = task.await;

        let mut state = self.state.lock();
        for key in stage.changes.keys() {
            state.running.remove(key);
        }
        drop(state);

        ok.then(|| {
            stage
                .changes
                .into_iter()
                .map(|(key, change)| (key, change.id))
                .collect_vec()
        })
    }
}

/// Per-change I/O: create intermediate directories on demand, then write
/// the payload or delete the file. A missing file on delete is fine.
fn io_task(path: PathBuf, op: ChangeOp) -> RunningTask {
    async move {
        let res = asyncify(move || match op {
            ChangeOp::Add(bytes) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, &bytes)
            }
            ChangeOp::Remove => match std::fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        })
        .await;
        match res {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[flusher] io failed: {}", e);
                false
            }
        }
    }
    .boxed()
    .shared()
}
