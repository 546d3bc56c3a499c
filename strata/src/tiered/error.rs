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

use strata_common::code::CodeError;

/// Errors enum for the tiered cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Disk tier error.
    #[error("storage error: {0}")]
    Storage(#[from] strata_storage::Error),
    /// Value ⇄ bytes conversion error.
    #[error("codec error: {0}")]
    Codec(#[from] CodeError),
    /// Other error.
    #[error("other error: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Create customized error.
    pub fn other<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Other(e.into())
    }
}

/// Result type for the tiered cache.
pub type Result<T> = std::result::Result<T, Error>;
