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
    fmt::Write,
    fs::Metadata,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use sha2::{Digest, Sha256};

use crate::error::{ErrorKind, Result};

/// Projection from a key to its filename within the cache directory.
///
/// Must be pure, deterministic, and collision-free within the caller's
/// keyset. Returning `None` skips the disk tier for that key entirely.
pub type FilenameFn<K> = Arc<dyn Fn(&K) -> Option<String> + Send + Sync>;

/// Location of the backing directory.
#[derive(Debug, Clone)]
pub enum CachePath {
    /// `<platform caches dir>/<name>`.
    Default(String),
    /// The given directory, verbatim.
    Custom(PathBuf),
}

impl CachePath {
    pub(crate) fn resolve(&self) -> Result<PathBuf> {
        match self {
            Self::Default(name) => dirs::cache_dir()
                .map(|dir| dir.join(name))
                .ok_or_else(|| ErrorKind::PathUnavailable(name.clone()).into()),
            Self::Custom(path) => Ok(path.clone()),
        }
    }
}

/// Digest a key's textual projection into a stable filename.
///
/// An empty projection yields no filename.
pub fn digest_filename(projection: &str) -> Option<String> {
    if projection.is_empty() {
        return None;
    }
    let digest = Sha256::digest(projection.as_bytes());
    let mut name = String::with_capacity(digest.len() * 2);
    for byte in digest {
        write!(name, "{byte:02x}").unwrap();
    }
    Some(name)
}

pub(crate) struct DirEntryMeta {
    pub path: PathBuf,
    /// Access stamp: the file modified time, maintained by the read-path
    /// touch. OS atime is not reliable enough for eviction ordering.
    pub accessed: SystemTime,
    pub len: u64,
    pub allocated: u64,
}

/// List the cache directory with per-entry metadata.
///
/// A missing directory reads as empty. Unreadable entries are skipped.
pub(crate) fn read_dir_meta(dir: &Path) -> io::Result<Vec<DirEntryMeta>> {
    let mut entries = vec![];
    let iter = match std::fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => return Err(e),
    };
    for entry in iter {
        let Ok(entry) = entry else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        entries.push(DirEntryMeta {
            path: entry.path(),
            accessed: meta.modified().unwrap_or(UNIX_EPOCH),
            len: meta.len(),
            allocated: allocated_size(&meta),
        });
    }
    Ok(entries)
}

#[cfg(unix)]
pub(crate) fn allocated_size(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.blocks() * 512
}

#[cfg(not(unix))]
pub(crate) fn allocated_size(meta: &Metadata) -> u64 {
    meta.len()
}

/// Best-effort update of the entry's access stamp.
pub(crate) fn touch(path: &Path, now: SystemTime) {
    let res = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(now));
    if let Err(e) = res {
        tracing::trace!("[store] skip access stamp for {:?}: {}", path, e);
    }
}
