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

use std::{fmt::Debug, future::Future};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use tokio::{sync::oneshot, task::JoinHandle};

/// FIFO chain of side-effectful asynchronous operations.
///
/// Every enqueued operation runs strictly after the previous one has
/// finished, whether the previous one succeeded, failed, or was aborted.
/// Readers that only need to observe earlier mutations await
/// [`OperationQueue::wait`] instead of taking a slot in the chain.
pub struct OperationQueue {
    tail: Mutex<Option<Shared<BoxFuture<'static, ()>>>>,
}

impl Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue").finish()
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        Self { tail: Mutex::new(None) }
    }

    /// Chain `work` after the current tail of the queue.
    ///
    /// The returned handle completes when `work` has been applied. Dropping
    /// the handle detaches the caller from the result; the work still runs
    /// and downstream operations still wait for it.
    pub fn enqueue<F, T>(&self, work: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let mut tail = self.tail.lock();

        let prev = tail.take();
        let chained = prev.clone();
        let handle = tokio::spawn(async move {
            if let Some(prev) = chained {
                prev.await;
            }
            let out = work.await;
            let _ = done_tx.send(());
            out
        });

        // The link waits for the whole chain up to and including this
        // operation, so an aborted task cannot release its successors
        // before its predecessors have finished.
        let link = async move {
            if let Some(prev) = prev {
                prev.await;
            }
            let _ = done_rx.await;
        }
        .boxed()
        .shared();
        *tail = Some(link);

        handle
    }

    /// Await the current tail of the queue.
    pub async fn wait(&self) {
        let tail = self.tail.lock().clone();
        if let Some(tail) = tail {
            tail.await;
        }
    }
}
