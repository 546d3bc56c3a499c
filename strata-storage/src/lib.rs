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

//! Disk tier for the strata cache: a staged write-back engine over a flat
//! directory of files.
//!
//! Mutations are appended to a staging log and flushed in batches after a
//! short debounce. Reads resolve through the staging log first, so the
//! latest logical value is always observable even while the physical I/O
//! lags. A background sweeper keeps the directory within its size and age
//! budgets.

mod error;
mod flusher;
mod fs;
mod staging;
mod store;
mod sweeper;

pub use error::{Error, ErrorKind, Result};
pub use fs::{digest_filename, CachePath, FilenameFn};
pub use store::{DiskCache, DiskCacheBuilder};
