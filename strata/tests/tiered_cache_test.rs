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

//! End-to-end scenarios for the tiered cache.

use std::{path::Path, time::Duration};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strata::{decode_json, encode_json, CachePath, CodeResult, TieredCache, TieredCacheBuilder, Value};

fn file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(iter) => iter.count(),
        Err(_) => 0,
    }
}

async fn drain(mut condition: impl FnMut() -> bool) {
    for _ in 0..4000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("drain timed out");
}

async fn open(dir: &Path) -> TieredCache<String, Bytes> {
    TieredCacheBuilder::new("test")
        .memory()
        .storage()
        .with_path(CachePath::Custom(dir.into()))
        .build()
        .await
        .unwrap()
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_read_your_write_before_flush() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path()).await;

    cache
        .store("key".to_string(), Bytes::from_static(b"value"))
        .await
        .unwrap();

    assert_eq!(
        cache.get(&"key".to_string()).await.unwrap(),
        Some(Bytes::from_static(b"value"))
    );
    assert_eq!(file_count(dir.path()), 0);

    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 1).await;
    assert_eq!(
        cache.get(&"key".to_string()).await.unwrap(),
        Some(Bytes::from_static(b"value"))
    );
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_remove_masks_until_a_later_store() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path()).await;

    cache
        .store("key".to_string(), Bytes::from_static(b"value"))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 1).await;

    cache.remove("key".to_string()).await.unwrap();
    assert_eq!(cache.get(&"key".to_string()).await.unwrap(), None);

    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 0).await;
    assert_eq!(cache.get(&"key".to_string()).await.unwrap(), None);

    cache
        .store("key".to_string(), Bytes::from_static(b"renewed"))
        .await
        .unwrap();
    assert_eq!(
        cache.get(&"key".to_string()).await.unwrap(),
        Some(Bytes::from_static(b"renewed"))
    );
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_clear_covers_every_key() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path()).await;

    for i in 0..4 {
        cache
            .store(format!("key{i}"), Bytes::from_static(b"value"))
            .await
            .unwrap();
    }
    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 4).await;

    cache.clear().await.unwrap();
    for i in 0..4 {
        assert_eq!(cache.get(&format!("key{i}")).await.unwrap(), None);
    }

    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 0).await;
    for i in 0..4 {
        assert_eq!(cache.get(&format!("key{i}")).await.unwrap(), None);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Asset {
    id: u64,
    label: String,
}

impl Value for Asset {
    fn encode(&self) -> CodeResult<Bytes> {
        encode_json(self)
    }

    fn decode(bytes: Bytes) -> CodeResult<Self> {
        decode_json(&bytes)
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_structured_value_read_through() {
    let dir = tempfile::tempdir().unwrap();
    let cache: TieredCache<String, Asset> = TieredCacheBuilder::new("test")
        .memory()
        .with_count_limit(1)
        .storage()
        .with_path(CachePath::Custom(dir.path().into()))
        .build()
        .await
        .unwrap();

    let asset = Asset {
        id: 7,
        label: "rendered artifact".to_string(),
    };
    cache.store("asset".to_string(), asset.clone()).await.unwrap();
    // A second store evicts the first from the single-slot memory tier.
    cache
        .store(
            "other".to_string(),
            Asset {
                id: 8,
                label: "decoded blob".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(cache.memory().count(), 1);

    tokio::time::advance(Duration::from_millis(1000)).await;
    drain(|| file_count(dir.path()) == 2).await;

    // The hit comes from disk, decodes, and repopulates the memory tier.
    assert_eq!(cache.get(&"asset".to_string()).await.unwrap(), Some(asset.clone()));
    assert_eq!(cache.memory().get(&"asset".to_string()).await, Some(asset));
}

#[derive(Debug, Clone, PartialEq)]
struct Unencodable(u64);

impl Value for Unencodable {
    fn encode(&self) -> CodeResult<Bytes> {
        Err(serde_json::from_str::<u64>("flop").unwrap_err().into())
    }

    fn decode(_: Bytes) -> CodeResult<Self> {
        Ok(Self(0))
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_encode_failure_drops_only_the_disk_half() {
    let dir = tempfile::tempdir().unwrap();
    let cache: TieredCache<String, Unencodable> = TieredCacheBuilder::new("test")
        .memory()
        .storage()
        .with_path(CachePath::Custom(dir.path().into()))
        .build()
        .await
        .unwrap();

    cache.store("key".to_string(), Unencodable(1)).await.unwrap();
    assert_eq!(cache.get(&"key".to_string()).await.unwrap(), Some(Unencodable(1)));

    tokio::time::advance(Duration::from_millis(1000)).await;
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    assert_eq!(file_count(dir.path()), 0);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_contains() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open(dir.path()).await;

    assert!(!cache.contains(&"key".to_string()).await.unwrap());
    cache
        .store("key".to_string(), Bytes::from_static(b"value"))
        .await
        .unwrap();
    assert!(cache.contains(&"key".to_string()).await.unwrap());
}
