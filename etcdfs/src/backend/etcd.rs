// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! etcd v3 store.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, DeleteOptions, GetOptions, KvClient};

use super::datasource::Datasource;
use super::{KvStore, StoreError};

pub struct EtcdStore {
    // `None` once closed.
    client: RwLock<Option<Client>>,
}

impl EtcdStore {
    pub async fn connect(ds: &Datasource) -> Result<Self, StoreError> {
        let endpoints = ds.endpoints();
        let options = ds
            .credentials()
            .map(|c| ConnectOptions::new().with_user(c.username.clone(), c.password.clone()));
        info!("connecting to etcd at {endpoints:?}");
        let client = Client::connect(&endpoints, options).await?;
        Ok(Self {
            client: RwLock::new(Some(client)),
        })
    }

    /// A fresh KV handle sharing the underlying channel, so callers never
    /// serialize on each other.
    fn kv(&self) -> Result<KvClient, StoreError> {
        let guard = self.client.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(Client::kv_client)
            .ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut kv = self.kv()?;
        let resp = kv.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn count_key(&self, key: &str) -> Result<u64, StoreError> {
        let mut kv = self.kv()?;
        let resp = kv
            .get(key, Some(GetOptions::new().with_count_only()))
            .await?;
        Ok(resp.count().max(0) as u64)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut kv = self.kv()?;
        let resp = kv
            .get(
                prefix,
                Some(GetOptions::new().with_prefix().with_count_only()),
            )
            .await?;
        Ok(resp.count().max(0) as u64)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut kv = self.kv()?;
        let resp = kv
            .get(prefix, Some(GetOptions::new().with_prefix().with_keys_only()))
            .await?;
        Ok(resp
            .kvs()
            .iter()
            .map(|kv| String::from_utf8_lossy(kv.key()).into_owned())
            .collect())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut kv = self.kv()?;
        kv.put(key, value, None).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut kv = self.kv()?;
        kv.delete(key, None).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        let mut kv = self.kv()?;
        kv.delete(prefix, Some(DeleteOptions::new().with_prefix()))
            .await?;
        Ok(())
    }

    async fn close(&self) {
        let client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if client.is_some() {
            info!("etcd connection closed");
        }
    }
}
