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

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Error on converting a cache value to or from its byte payload.
#[derive(thiserror::Error, Debug)]
pub enum CodeError {
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type CodeResult<T> = std::result::Result<T, CodeError>;

/// Key type of the cache.
pub trait Key: Send + Sync + 'static + std::hash::Hash + Eq + Clone + std::fmt::Debug {}

impl<T: Send + Sync + 'static + std::hash::Hash + Eq + Clone + std::fmt::Debug> Key for T {}

/// Value type of the cache.
///
/// A value converts to and from an opaque byte payload for the disk tier.
/// Byte-typed values pass through unchanged; the provided impls for
/// primitives and [`String`] use the default self-describing codec. Empty
/// payloads are valid and round-trip.
pub trait Value: Sized + Send + Sync + 'static {
    fn encode(&self) -> CodeResult<Bytes>;

    fn decode(bytes: Bytes) -> CodeResult<Self>;

    /// Cost charged against the memory tier limits.
    ///
    /// Byte payloads weigh their length; other values weigh nothing unless
    /// overridden.
    fn weight(&self) -> usize {
        0
    }
}

/// Encode a structured value with the default self-describing codec.
pub fn encode_json<T: Serialize>(value: &T) -> CodeResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// Decode a structured value with the default self-describing codec.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> CodeResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

impl Value for Bytes {
    fn encode(&self) -> CodeResult<Bytes> {
        Ok(self.clone())
    }

    fn decode(bytes: Bytes) -> CodeResult<Self> {
        Ok(bytes)
    }

    fn weight(&self) -> usize {
        self.len()
    }
}

impl Value for Vec<u8> {
    fn encode(&self) -> CodeResult<Bytes> {
        Ok(Bytes::copy_from_slice(self))
    }

    fn decode(bytes: Bytes) -> CodeResult<Self> {
        Ok(bytes.to_vec())
    }

    fn weight(&self) -> usize {
        self.len()
    }
}

macro_rules! impl_value_with_codec {
    ($( $type:ty, )*) => {
        $(
            impl Value for $type {
                fn encode(&self) -> CodeResult<Bytes> {
                    encode_json(self)
                }

                fn decode(bytes: Bytes) -> CodeResult<Self> {
                    decode_json(&bytes)
                }
            }
        )*
    };
}

impl_value_with_codec! {
    u8, u16, u32, u64, usize,
    i8, i16, i32, i64, isize,
    f32, f64,
    bool,
    String,
}
