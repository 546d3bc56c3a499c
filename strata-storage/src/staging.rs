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

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use strata_common::code::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    Add(Bytes),
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub id: u64,
    pub op: ChangeOp,
}

/// A batch of staged mutations that share a causal frontier.
///
/// Only the newest stage accepts further changes; a mutation that would
/// conflict with pending entries opens a new stage instead.
#[derive(Debug, Clone)]
pub struct Stage<K>
where
    K: Key,
{
    pub id: u64,
    pub remove_all: bool,
    pub changes: HashMap<K, Change>,
}

/// Outcome of resolving a key against the staging log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    Value(Bytes),
    Tombstone,
}

/// Ordered layers of pending changes, oldest stage first.
///
/// Stage ids increase strictly, and change ids increase strictly across the
/// whole log. Reads resolve newest stage first.
#[derive(Debug)]
pub struct StagingLog<K>
where
    K: Key,
{
    stages: VecDeque<Stage<K>>,
    next_stage_id: u64,
    next_change_id: u64,
}

impl<K> Default for StagingLog<K>
where
    K: Key,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> StagingLog<K>
where
    K: Key,
{
    pub fn new() -> Self {
        Self {
            stages: VecDeque::new(),
            next_stage_id: 0,
            next_change_id: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of stages in the log.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn oldest(&self) -> Option<&Stage<K>> {
        self.stages.front()
    }

    pub fn add(&mut self, key: K, bytes: Bytes) {
        self.push_change(key, ChangeOp::Add(bytes));
    }

    pub fn remove(&mut self, key: K) {
        self.push_change(key, ChangeOp::Remove);
    }

    /// Open a `remove_all` stage masking every key until it is flushed.
    ///
    /// The new stage carries a synthesized `Remove` for every key observed
    /// live in the log, so per-key accounting during the flush stays
    /// uniform.
    pub fn remove_all(&mut self) {
        let keys: Vec<K> = self
            .stages
            .iter()
            .flat_map(|stage| stage.changes.keys().cloned())
            .collect();

        let mut stage = self.new_stage(true);
        for key in keys {
            let change = self.new_change(ChangeOp::Remove);
            stage.changes.insert(key, change);
        }
        self.stages.push_back(stage);
    }

    /// Resolve the most recent logical operation on `key`, newest stage
    /// first. A `remove_all` stage masks every key it does not carry.
    pub fn resolve(&self, key: &K) -> Option<Staged> {
        for stage in self.stages.iter().rev() {
            if let Some(change) = stage.changes.get(key) {
                return Some(match &change.op {
                    ChangeOp::Add(bytes) => Staged::Value(bytes.clone()),
                    ChangeOp::Remove => Staged::Tombstone,
                });
            }
            if stage.remove_all {
                return Some(Staged::Tombstone);
            }
        }
        None
    }

    /// Acknowledge flushed changes of a stage.
    ///
    /// A change is only dropped when its id still matches, so a flush racing
    /// a supersession is a no-op. The stage is dropped once empty.
    pub fn flushed(&mut self, stage_id: u64, changes: &[(K, u64)]) {
        let Some(index) = self.stages.iter().position(|stage| stage.id == stage_id) else {
            return;
        };

        let stage = &mut self.stages[index];
        for (key, change_id) in changes {
            if stage.changes.get(key).map(|change| change.id) == Some(*change_id) {
                stage.changes.remove(key);
            }
        }
        if stage.changes.is_empty() {
            self.stages.remove(index);
        }
    }

    /// A further change for `key` conflicts when the newest stage is a
    /// `remove_all` stage or already carries `key`.
    fn conflicts(&self, key: &K) -> bool {
        match self.stages.back() {
            Some(stage) => stage.remove_all || stage.changes.contains_key(key),
            None => false,
        }
    }

    fn push_change(&mut self, key: K, op: ChangeOp) {
        let change = self.new_change(op);
        if self.stages.is_empty() || self.conflicts(&key) {
            let stage = self.new_stage(false);
            self.stages.push_back(stage);
        }
        self.stages
            .back_mut()
            .unwrap()
            .changes
            .insert(key, change);
    }

    fn new_stage(&mut self, remove_all: bool) -> Stage<K> {
        let id = self.next_stage_id;
        self.next_stage_id += 1;
        Stage {
            id,
            remove_all,
            changes: HashMap::new(),
        }
    }

    fn new_change(&mut self, op: ChangeOp) -> Change {
        let id = self.next_change_id;
        self.next_change_id += 1;
        Change { id, op }
    }
}
