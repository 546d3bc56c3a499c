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

/// Disk tier error.
#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct Error(Box<ErrorKind>);

/// Disk tier error kinds.
#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    /// No backing directory could be resolved for the cache.
    #[error("no such cache directory for \"{0}\"")]
    PathUnavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn is_path_unavailable(&self) -> bool {
        matches!(*self.0, ErrorKind::PathUnavailable(_))
    }

    pub fn other<E>(e: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        ErrorKind::Other(e.into()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self(Box::new(kind))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Io(e).into()
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        ErrorKind::Other(e).into()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_size() {
        assert_eq!(std::mem::size_of::<Error>(), std::mem::size_of::<usize>());
    }
}
