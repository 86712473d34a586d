// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory store, used for local development and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{KvStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection: every call fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Copy of the whole keyspace.
    pub fn dump(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn with_prefix<T>(&self, prefix: &str, f: impl FnOnce(Vec<(&String, &Vec<u8>)>) -> T) -> T {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let matched = entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .collect();
        f(matched)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn count_key(&self, key: &str) -> Result<u64, StoreError> {
        self.check()?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(u64::from(entries.contains_key(key)))
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.with_prefix(prefix, |m| m.len() as u64))
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self.with_prefix(prefix, |m| {
            m.into_iter().map(|(k, _)| k.clone()).collect()
        }))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        self.check()?;
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_scan_is_ordered_and_bounded() {
        let store = MemoryStore::new();
        for key in ["/a/", "/a/y", "/a/x", "/ab", "/b"] {
            store.put(key, b"").await.unwrap();
        }
        assert_eq!(
            store.keys_with_prefix("/a/").await.unwrap(),
            ["/a/", "/a/x", "/a/y"]
        );
        assert_eq!(store.count_prefix("/a").await.unwrap(), 4);
        assert_eq!(store.count_key("/ab").await.unwrap(), 1);

        store.delete_prefix("/a/").await.unwrap();
        assert_eq!(store.keys_with_prefix("/").await.unwrap(), ["/ab", "/b"]);
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.put("/k", b"v").await.unwrap();
        store.set_offline(true);
        assert!(matches!(
            store.get("/k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.put("/k", b"w").await.is_err());
        store.set_offline(false);
        assert_eq!(store.get("/k").await.unwrap(), Some(b"v".to_vec()));
    }
}
