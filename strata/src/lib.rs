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

#![warn(missing_docs)]

//! A two-tier data cache: an in-process LRU memory tier over a staged
//! write-back disk tier.
//!
//! Reads consult memory first, then disk, and populate the memory tier on a
//! disk hit. Writes propagate to both tiers; the disk half is staged and
//! written back in deferred batches, so the latest logical value is always
//! observable even while the physical I/O lags.

use strata_common as common;
use strata_memory as memory;
use strata_storage as storage;

mod tiered;

mod prelude;
pub use prelude::*;
