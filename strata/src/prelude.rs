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

pub use crate::{
    common::{
        code::{decode_json, encode_json, CodeError, CodeResult, Key, Value},
        queue::OperationQueue,
    },
    memory::{LruMap, MemoryCache, MemoryCacheBuilder, Weighter},
    storage::{
        digest_filename, CachePath, DiskCache, DiskCacheBuilder, Error as StorageError,
        ErrorKind as StorageErrorKind, FilenameFn, Result as StorageResult,
    },
    tiered::{
        builder::{TieredCacheBuilder, TieredCacheBuilderPhaseMemory, TieredCacheBuilderPhaseStorage},
        cache::TieredCache,
        error::{Error, Result},
    },
};
